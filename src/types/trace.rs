//! Trace request and response types
//!
//! Covers `POST /trace/tx`, `POST /trace/call` and `POST /trace/call-many`.
//! The API runs up to four tracers per request:
//! - `callTracer`: nested call frames
//! - `prestateTracer`: account state before (and optionally after) execution
//! - `structLogger`: opcode-level execution log
//! - `4byteTracer`: function selector statistics

use std::collections::{BTreeMap, HashMap};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::{Address, BlockOverrides, Bytes, LogEntry, StateOverride, TransactionCall, B256, U256, U64};

/// Request body of `POST /trace/tx`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceTransactionRequest {
    /// Hash of a mined transaction
    pub transaction_hash: B256,
    #[serde(default)]
    pub tracer_config: TraceConfig,
}

/// Request body of `POST /trace/call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceCallRequest {
    pub call: TransactionCall,
    /// Block tag or hex number to execute on
    pub block: String,
    #[serde(default)]
    pub tracer_config: TraceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_overrides: Option<BTreeMap<Address, StateOverride>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_overrides: Option<BlockOverrides>,
}

/// Request body of `POST /trace/call-many`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceCallManyRequest {
    pub bundles: Vec<Bundle>,
    pub state_context: StateContext,
    #[serde(default)]
    pub tracer_config: TraceConfig,
}

/// A group of transactions executed on top of each other
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub transactions: Vec<TransactionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_override: Option<BlockOverrides>,
}

/// Starting point of a `call-many` execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateContext {
    /// Block tag or hex number
    pub block: String,
    /// Position within the block
    #[serde(default)]
    pub tx_index: TxIndex,
}

impl Default for StateContext {
    fn default() -> Self {
        Self { block: "latest".to_string(), tx_index: TxIndex::End }
    }
}

/// Transaction index within a block
///
/// Serialized as an integer where `-1` stands for the end of the block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TxIndex {
    /// After every transaction of the block
    #[default]
    End,
    /// Before the transaction at this position
    Index(u64),
}

impl Serialize for TxIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TxIndex::End => serializer.serialize_i64(-1),
            TxIndex::Index(index) => serializer.serialize_u64(*index),
        }
    }
}

impl<'de> Deserialize<'de> for TxIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match i64::deserialize(deserializer)? {
            -1 => Ok(TxIndex::End),
            index if index >= 0 => Ok(TxIndex::Index(index as u64)),
            index => Err(de::Error::custom(format!("invalid txIndex {index}, expected -1 or >= 0"))),
        }
    }
}

/// Tracer selection and settings
///
/// Only the call tracer runs by default. `callTracer` is always serialized
/// (as `null` when disabled) because the API enables it when the key is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceConfig {
    #[serde(rename = "4byteTracer")]
    pub four_byte_tracer: bool,
    pub call_tracer: Option<CallTracerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prestate_tracer: Option<PrestateTracerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub struct_logger: Option<StructLoggerConfig>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            four_byte_tracer: false,
            call_tracer: Some(CallTracerConfig::default()),
            prestate_tracer: None,
            struct_logger: None,
        }
    }
}

impl TraceConfig {
    /// Configuration with every tracer disabled
    pub fn none() -> Self {
        Self { call_tracer: None, ..Default::default() }
    }
}

/// Call tracer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallTracerConfig {
    /// Trace only the top-level call
    pub only_top_call: bool,
    /// Attach logs to call frames
    pub with_logs: bool,
}

impl Default for CallTracerConfig {
    fn default() -> Self {
        Self { only_top_call: false, with_logs: true }
    }
}

/// Prestate tracer settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrestateTracerConfig {
    /// Return both pre and post state
    pub diff_mode: bool,
    pub disable_code: bool,
    pub disable_storage: bool,
}

/// Struct logger settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructLoggerConfig {
    pub disable_memory: bool,
    pub disable_stack: bool,
    pub disable_storage: bool,
    pub disable_return_data: bool,
    /// Drop empty fields from every log entry
    pub clean_struct_logs: bool,
}

impl Default for StructLoggerConfig {
    fn default() -> Self {
        Self {
            disable_memory: true,
            disable_stack: false,
            disable_storage: false,
            disable_return_data: false,
            clean_struct_logs: true,
        }
    }
}

/// Response of the trace endpoints
///
/// Only the tracers that were requested are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracerResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TransactionReceiptInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_tracer: Option<CallTraceResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prestate_tracer: Option<PrestateTraceResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub struct_logger: Option<StructLogResponse>,
    #[serde(default, rename = "4byteTracer", skip_serializing_if = "Option::is_none")]
    pub four_byte_tracer: Option<FourByteResponse>,
}

/// Receipt of a traced transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceiptInfo {
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    pub gas_used: U64,
    pub effective_gas_price: U256,
    pub cumulative_gas_used: U64,
    pub transaction_type: u8,
    /// `true` when the transaction succeeded
    pub status: bool,
    pub logs_bloom: String,
    pub logs_count: u64,
}

/// Call tracer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTraceResponse {
    pub root_call: CallFrame,
    pub total_calls: u64,
    pub max_depth: u32,
}

/// A single call in the call tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// `CALL`, `STATICCALL`, `DELEGATECALL`, `CALLCODE`, `CREATE` or `CREATE2`
    pub call_type: String,
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub gas: U256,
    #[serde(default)]
    pub gas_used: U256,
    #[serde(default)]
    pub input: Bytes,
    #[serde(default)]
    pub output: Bytes,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub reverted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    #[serde(default)]
    pub calls: Vec<CallFrame>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl CallFrame {
    /// Whether this frame failed
    pub fn is_failed(&self) -> bool {
        self.reverted || self.error.is_some()
    }

    /// Gas used by this frame, saturated to `u64`
    pub fn gas_used_u64(&self) -> u64 {
        self.gas_used.saturating_to()
    }

    /// Upper-cased call type
    pub fn kind(&self) -> String {
        self.call_type.to_ascii_uppercase()
    }
}

/// Prestate tracer output
///
/// Diff mode is listed first so that `{pre, post}` objects are never taken
/// for an account map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrestateTraceResponse {
    /// State before and after execution
    Diff(PrestateDiff),
    /// State touched by the execution
    Default(BTreeMap<Address, AccountState>),
}

/// Pre and post state of every modified account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrestateDiff {
    pub pre: BTreeMap<Address, AccountState>,
    pub post: BTreeMap<Address, AccountState>,
}

/// Account state snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<B256, B256>,
}

/// Struct logger output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructLogResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub struct_logs: Option<Vec<StructLog>>,
    #[serde(default)]
    pub total_opcodes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub total_gas: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_gas_refunded: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_counter: Option<u64>,
}

impl StructLogResponse {
    /// Struct logs, or an empty slice when they were not returned
    pub fn logs(&self) -> &[StructLog] {
        self.struct_logs.as_deref().unwrap_or_default()
    }
}

/// One executed opcode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructLog {
    pub pc: u64,
    pub op: String,
    pub gas: u64,
    pub gas_cost: u64,
    pub depth: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stack, bottom first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<U256>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_size: Option<u64>,
    /// Storage of the executing contract as seen at this step
    #[serde(default, deserialize_with = "deserialize_slots", skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<B256, B256>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund: Option<u64>,
}

impl StructLog {
    /// Stack item `n` positions below the top
    pub fn stack_peek(&self, n: usize) -> Option<U256> {
        let stack = self.stack.as_ref()?;
        stack.len().checked_sub(n + 1).map(|i| stack[i])
    }
}

/// 4byte tracer output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FourByteResponse {
    /// Keyed by `selector-calldatasize`
    #[serde(default)]
    pub identifiers: HashMap<String, FourByteInfo>,
    #[serde(default)]
    pub total_identifiers: u64,
}

/// Selector statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FourByteInfo {
    pub data_size: u64,
    pub count: u64,
}

/// Parses storage maps whose keys may be zero-padded, unprefixed or quoted
fn deserialize_slots<'de, D>(deserializer: D) -> Result<Option<BTreeMap<B256, B256>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, String>> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let mut slots = BTreeMap::new();
    for (key, value) in raw {
        match (parse_word(&key), parse_word(&value)) {
            (Some(key), Some(value)) => {
                slots.insert(key, value);
            }
            _ => return Err(de::Error::custom(format!("invalid storage entry {key}: {value}"))),
        }
    }
    Ok(Some(slots))
}

/// Parses a 32-byte word from a hex string, tolerating missing prefixes and padding
pub(crate) fn parse_word(raw: &str) -> Option<B256> {
    let trimmed = raw.trim().trim_matches('"');
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix('x'))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Some(B256::ZERO);
    }
    U256::from_str_radix(digits, 16).ok().map(B256::from)
}
