//! Core types for the Altitrace API wire model
//!
//! This module defines the JSON structures exchanged with the simulation API:
//! - Response envelope and error payloads
//! - Transaction calls, state overrides and block overrides
//! - Simulation, trace and access list requests/responses
//!
//! Hex quantities are decoded straight into `alloy` primitives so callers
//! never have to deal with `0x`-prefixed strings.

use std::collections::BTreeMap;

pub use alloy::eips::eip2930::{AccessList, AccessListItem};
pub use alloy::primitives::{Address, Bytes, B256, I256, U256, U64};
use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, ValidationError};

pub mod access_list;
pub mod simulation;
pub mod trace;

pub use access_list::*;
pub use simulation::*;
pub use trace::*;

/// Pseudo token address used by the API for native value transfers
/// when `traceTransfers` is enabled
pub const NATIVE_TRANSFER_ADDRESS: Address = Address::new([0xee; 20]);

/// Standard API response wrapper
///
/// Every endpoint answers with this envelope. `data` is present on success,
/// `error` on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request was processed successfully
    pub success: bool,
    /// Response payload
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
    /// Request metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

impl<T> ApiResponse<T> {
    /// Unwraps the envelope into its payload
    ///
    /// # Returns
    /// * `Ok(T)` - The payload of a successful response
    /// * `Err(ClientError::Api)` - If the API flagged the request as failed
    ///   or returned no payload
    pub fn into_result(self) -> Result<T, ClientError> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(error)) => Err(ClientError::Api {
                code: error.code,
                message: error.message,
                suggestion: error.suggestion,
            }),
            (_, _, None) => Err(ClientError::Api {
                code: "EMPTY_RESPONSE".to_string(),
                message: "API returned neither data nor error".to_string(),
                suggestion: None,
            }),
        }
    }
}

/// Error details returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Machine-readable error code (e.g. `SIMULATION_FAILED`)
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Structured details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Suggested resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Metadata attached to every API response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Request identifier for correlation
    pub request_id: String,
    /// RFC 3339 timestamp of the response
    pub timestamp: String,
    /// Server-side processing time in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
}

/// A single transaction call
///
/// Every field is optional; the API fills in defaults the way `eth_call` does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCall {
    /// Sender address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Recipient (none for contract creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Calldata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    /// Native value in wei
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    /// Gas limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    /// EIP-2930 access list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<AccessList>,
}

impl TransactionCall {
    /// Returns a copy of this call with `access_list` applied
    pub fn with_access_list(&self, access_list: AccessList) -> Self {
        Self { access_list: Some(access_list), ..self.clone() }
    }

    /// Whether the call deploys a contract
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

/// Block tag used as simulation parent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    /// The latest mined block
    #[default]
    Latest,
    /// The genesis block
    Earliest,
    /// The latest safe block
    Safe,
    /// The latest finalized block
    Finalized,
}

impl BlockTag {
    /// Tag as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockTag::Latest => "latest",
            BlockTag::Earliest => "earliest",
            BlockTag::Safe => "safe",
            BlockTag::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for BlockTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockTag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(BlockTag::Latest),
            "earliest" => Ok(BlockTag::Earliest),
            "safe" => Ok(BlockTag::Safe),
            "finalized" => Ok(BlockTag::Finalized),
            other => Err(ValidationError::InvalidValue {
                field: "blockTag",
                reason: format!("unknown tag '{other}'"),
            }),
        }
    }
}

/// Account state override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateOverride {
    /// Overridden account (required in list form, implied in map form)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Balance in wei
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    /// Account nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Runtime bytecode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    /// Full storage replacement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<B256, B256>>,
    /// Slot-level storage patch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_diff: Option<BTreeMap<B256, B256>>,
    /// Full storage replacement as a slot list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Vec<StorageSlot>>,
    /// Relocate a precompile to this address
    #[serde(
        default,
        rename = "movePrecompileToAddress",
        skip_serializing_if = "Option::is_none"
    )]
    pub move_precompile_to_address: Option<Address>,
}

impl StateOverride {
    /// Creates an empty override for `address`
    pub fn for_account(address: Address) -> Self {
        Self { address: Some(address), ..Default::default() }
    }

    /// Validates that `state` and `state_diff` are mutually exclusive
    pub fn validate_state_exclusivity(&self) -> Result<(), ValidationError> {
        if self.state.is_some() && self.state_diff.is_some() {
            return Err(ValidationError::StateExclusivity {
                address: self.address.map(|a| a.to_string()).unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Merges `other` on top of `self`
    ///
    /// Scalars from `other` win. Storage patches are merged slot by slot.
    pub fn merge(&mut self, other: &StateOverride) {
        if other.balance.is_some() {
            self.balance = other.balance;
        }
        if other.nonce.is_some() {
            self.nonce = other.nonce;
        }
        if other.code.is_some() {
            self.code = other.code.clone();
        }
        if let Some(storage) = &other.storage {
            self.storage = Some(storage.clone());
            self.state_diff = None;
        }
        if let Some(diff) = &other.state_diff {
            // a full replacement absorbs later patches
            let target = match (&mut self.storage, &mut self.state_diff) {
                (Some(storage), _) => storage,
                (None, Some(existing)) => existing,
                (None, None) => self.state_diff.get_or_insert_with(BTreeMap::new),
            };
            for (slot, value) in diff {
                target.insert(*slot, *value);
            }
        }
    }
}

/// Storage slot assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSlot {
    /// Slot key
    pub slot: B256,
    /// Slot value
    pub value: B256,
}

/// Block environment overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOverrides {
    /// Block number
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "blockNumber")]
    pub number: Option<U256>,
    /// Difficulty (pre-merge chains)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<U256>,
    /// Block timestamp in seconds
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "timestamp")]
    pub time: Option<u64>,
    /// Block gas limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Fee recipient
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "feeRecipient")]
    pub coinbase: Option<Address>,
    /// PREVRANDAO value
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "prevRandao")]
    pub random: Option<B256>,
    /// EIP-1559 base fee
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "baseFeePerGas")]
    pub base_fee: Option<U256>,
    /// BLOCKHASH opcode answers, keyed by block number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<BTreeMap<u64, B256>>,
}

/// Event log as emitted inside a call frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics
    #[serde(default)]
    pub topics: Vec<B256>,
    /// Non-indexed data
    #[serde(default)]
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    #[test]
    fn test_envelope_success() {
        let json = r#"{
            "success": true,
            "data": {"from": "0x742d35cc6634c0532925a3b844bc9e7595f06e8c"},
            "metadata": {"requestId": "req_1", "timestamp": "2025-01-01T00:00:00Z", "executionTime": 12}
        }"#;
        let response: ApiResponse<TransactionCall> = serde_json::from_str(json).unwrap();
        let call = response.into_result().unwrap();
        assert_eq!(call.from, Some(address!("742d35cc6634c0532925a3b844bc9e7595f06e8c")));
    }

    #[test]
    fn test_envelope_error() {
        let json = r#"{
            "success": false,
            "error": {"code": "SIMULATION_FAILED", "message": "boom", "suggestion": "retry"},
            "metadata": {"requestId": "req_2", "timestamp": "2025-01-01T00:00:00Z"}
        }"#;
        let response: ApiResponse<TransactionCall> = serde_json::from_str(json).unwrap();
        match response.into_result() {
            Err(ClientError::Api { code, suggestion, .. }) => {
                assert_eq!(code, "SIMULATION_FAILED");
                assert_eq!(suggestion.as_deref(), Some("retry"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_transaction_call_wire_format() {
        let call = TransactionCall {
            to: Some(address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")),
            value: Some(U256::from(1_000u64)),
            gas: Some(U64::from(21_000u64)),
            ..Default::default()
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["value"], "0x3e8");
        assert_eq!(json["gas"], "0x5208");
        assert!(json.get("from").is_none());
        assert!(json.get("accessList").is_none());
    }

    #[test]
    fn test_block_tag_parse() {
        assert_eq!("Finalized".parse::<BlockTag>().unwrap(), BlockTag::Finalized);
        assert_eq!(" latest ".parse::<BlockTag>().unwrap(), BlockTag::Latest);
        assert!("pending".parse::<BlockTag>().is_err());
    }

    #[test]
    fn test_state_override_exclusivity() {
        let mut state_override = StateOverride::for_account(Address::ZERO);
        state_override.state = Some(vec![]);
        state_override.state_diff = Some(BTreeMap::new());
        assert!(state_override.validate_state_exclusivity().is_err());

        state_override.state_diff = None;
        assert!(state_override.validate_state_exclusivity().is_ok());
    }

    #[test]
    fn test_state_override_merge() {
        let slot_a = b256!("0000000000000000000000000000000000000000000000000000000000000001");
        let slot_b = b256!("0000000000000000000000000000000000000000000000000000000000000002");
        let mut base = StateOverride::for_account(Address::ZERO);
        base.balance = Some(U256::from(10));
        base.state_diff = Some(BTreeMap::from([(slot_a, B256::repeat_byte(1))]));

        let mut next = StateOverride::for_account(Address::ZERO);
        next.nonce = Some(3);
        next.state_diff = Some(BTreeMap::from([
            (slot_a, B256::repeat_byte(2)),
            (slot_b, B256::repeat_byte(3)),
        ]));
        base.merge(&next);

        assert_eq!(base.balance, Some(U256::from(10)));
        assert_eq!(base.nonce, Some(3));
        let diff = base.state_diff.unwrap();
        assert_eq!(diff[&slot_a], B256::repeat_byte(2));
        assert_eq!(diff[&slot_b], B256::repeat_byte(3));
    }

    #[test]
    fn test_block_overrides_aliases() {
        let overrides: BlockOverrides =
            serde_json::from_str(r#"{"blockNumber": "0x10", "timestamp": 1700000000}"#).unwrap();
        assert_eq!(overrides.number, Some(U256::from(16)));
        assert_eq!(overrides.time, Some(1_700_000_000));
    }
}
