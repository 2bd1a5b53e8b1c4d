//! Simulation request and result types
//!
//! Covers `POST /simulate` and `POST /simulate/batch`.

use serde::{Deserialize, Serialize};

use super::{Address, BlockOverrides, BlockTag, Bytes, StateOverride, TransactionCall, B256, I256, U256, U64};

fn default_true() -> bool {
    true
}

/// Simulation request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    /// Core simulation parameters
    pub params: SimulationParams,
    /// State and block overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<SimulationOptions>,
}

/// Core simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParams {
    /// Calls executed in order within one simulated block
    pub calls: Vec<TransactionCall>,
    /// Account whose asset changes are tracked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Address>,
    /// Parent block number, as a hex quantity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<U64>,
    /// Parent block tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_tag: Option<BlockTag>,
    /// Enable transaction validation (nonce, balance, fees)
    #[serde(default = "default_true")]
    pub validation: bool,
    /// Track token balance changes of `account`
    #[serde(default = "default_true")]
    pub trace_asset_changes: bool,
    /// Emit native transfers as ERC-20 style logs
    #[serde(default = "default_true")]
    pub trace_transfers: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            account: None,
            block_number: None,
            block_tag: None,
            validation: true,
            trace_asset_changes: true,
            trace_transfers: true,
        }
    }
}

/// Simulation options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOptions {
    /// Account state overrides, each carrying its `address`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_overrides: Option<Vec<StateOverride>>,
    /// Block environment overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_overrides: Option<BlockOverrides>,
}

/// Overall simulation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    /// All calls succeeded
    Success,
    /// At least one call reverted
    Reverted,
    /// The simulation itself failed
    Failed,
}

/// Outcome of a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Call completed
    Success,
    /// Call reverted
    Reverted,
}

/// Simulation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Unique simulation identifier
    pub simulation_id: String,
    /// Block the simulation was executed on
    pub block_number: U64,
    /// Overall status
    pub status: SimulationStatus,
    /// Per-call results, in request order
    pub calls: Vec<CallResult>,
    /// Gas used by all calls
    pub gas_used: U64,
    /// Gas used by the simulated block
    pub block_gas_used: U64,
    /// Balance changes of the traced account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_changes: Option<Vec<AssetChange>>,
}

/// Result of a single call within a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    /// Index in the request
    pub call_index: u32,
    /// Call outcome
    pub status: CallStatus,
    /// Data returned by the call
    #[serde(default)]
    pub return_data: Bytes,
    /// Gas used by the call
    pub gas_used: U64,
    /// Logs emitted by the call
    #[serde(default)]
    pub logs: Vec<EnhancedLog>,
    /// Error details when the call reverted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CallError>,
}

/// Call error details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallError {
    /// Revert reason
    pub reason: String,
    /// Error classification (e.g. `execution-reverted`)
    pub error_type: String,
    /// Additional message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Contract that raised the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
}

/// Log with optional ABI decoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedLog {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<U64>,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub removed: bool,
    /// Decoded event, when the signature is known to the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoded: Option<DecodedEvent>,
}

/// Decoded event information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    /// Event name (e.g. `Transfer`)
    pub name: String,
    /// Full signature (e.g. `Transfer(address,address,uint256)`)
    pub signature: String,
    /// Token standard (e.g. `ERC20`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,
    pub description: String,
    #[serde(default)]
    pub params: Vec<DecodedEventParam>,
    /// One-line human readable summary
    pub summary: String,
}

/// Decoded event parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEventParam {
    pub name: String,
    pub param_type: String,
    pub value: String,
    pub indexed: bool,
}

/// Asset balance change of the traced account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetChange {
    pub token: TokenInfo,
    pub value: BalanceChange,
}

/// Token metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    /// Token contract (`0xeeee…` for native value)
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Balance before and after the simulation
///
/// `diff` is kept as received since the API may sign it. Use
/// [`BalanceChange::signed_diff`] for arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChange {
    pub pre: U256,
    pub post: U256,
    pub diff: String,
}

impl BalanceChange {
    /// Signed balance delta
    ///
    /// Parses `diff` when it is a (possibly `-` prefixed) decimal or hex
    /// quantity and falls back to `post - pre` otherwise.
    pub fn signed_diff(&self) -> I256 {
        parse_signed_quantity(&self.diff).unwrap_or_else(|| signed_delta(self.pre, self.post))
    }
}

/// Computes `post - pre` as a signed integer, saturating at the I256 bounds
pub fn signed_delta(pre: U256, post: U256) -> I256 {
    if post >= pre {
        I256::try_from(post - pre).unwrap_or(I256::MAX)
    } else {
        I256::try_from(pre - post).map(|d| -d).unwrap_or(I256::MIN)
    }
}

fn parse_signed_quantity(raw: &str) -> Option<I256> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let magnitude: U256 = digits.parse().ok()?;
    let value = I256::try_from(magnitude).ok()?;
    Some(if negative { -value } else { value })
}
