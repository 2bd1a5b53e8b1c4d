//! Storage access reconstruction from struct logs
//!
//! Recovers persistent (`SLOAD`/`SSTORE`) and transient (`TLOAD`/`TSTORE`)
//! storage operations from an opcode trace, and splits execution gas into
//! opcode categories.
//!
//! Struct logs do not carry the executing contract. It is recovered from the
//! target of each `CALL`/`STATICCALL`, while `DELEGATECALL`/`CALLCODE` keep the
//! caller's storage. Frames whose contract cannot be recovered (the root
//! without a call trace, fresh deployments) get a context of their own.

use std::{collections::BTreeMap, fmt};

use serde::{Serialize, Serializer};

use crate::{
    errors::AnalysisError,
    types::{Address, StructLog, StructLogResponse, B256},
};

/// Storage owner of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageContext {
    /// Storage of a known contract
    Contract(Address),
    /// Storage of an unidentified contract, numbered in order of appearance
    Frame(usize),
}

impl fmt::Display for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract(address) => write!(f, "{address}"),
            Self::Frame(n) => write!(f, "frame#{n}"),
        }
    }
}

impl Serialize for StorageContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Call stack of storage contexts while walking struct logs
struct ContextStack {
    frames: Vec<StorageContext>,
    /// Frame the previous step may have opened, `Some(None)` when its
    /// contract is unknown
    pending: Option<Option<StorageContext>>,
    unknown: usize,
}

impl ContextStack {
    fn new(root: Option<Address>) -> Self {
        let mut stack = Self { frames: Vec::new(), pending: None, unknown: 0 };
        let root = root.map(StorageContext::Contract).unwrap_or_else(|| stack.next_unknown());
        stack.frames.push(root);
        stack
    }

    fn next_unknown(&mut self) -> StorageContext {
        self.unknown += 1;
        StorageContext::Frame(self.unknown - 1)
    }

    /// Moves to `depth` (1-based) and returns the current context
    fn enter(&mut self, depth: u64) -> StorageContext {
        let depth = usize::try_from(depth.max(1)).unwrap_or(usize::MAX);
        self.frames.truncate(depth);
        while self.frames.len() < depth {
            let context = match self.pending.take().flatten() {
                Some(context) => context,
                None => self.next_unknown(),
            };
            self.frames.push(context);
        }
        // a call into an account without code opens no frame
        self.pending = None;
        self.current()
    }

    fn current(&self) -> StorageContext {
        self.frames.last().copied().unwrap_or(StorageContext::Frame(0))
    }

    /// Records the frame a call opcode is about to open
    fn observe(&mut self, log: &StructLog) {
        self.pending = match log.op.as_str() {
            "CALL" | "STATICCALL" => {
                Some(log.stack_peek(1).map(|word| StorageContext::Contract(Address::from_word(B256::from(word)))))
            }
            "DELEGATECALL" | "CALLCODE" => Some(Some(self.current())),
            "CREATE" | "CREATE2" => Some(None),
            _ => None,
        };
    }
}

/// Kind of storage access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StorageOpKind {
    Sload,
    Sstore,
    Tload,
    Tstore,
}

impl StorageOpKind {
    fn from_opcode(op: &str) -> Option<Self> {
        match op {
            "SLOAD" => Some(Self::Sload),
            "SSTORE" => Some(Self::Sstore),
            "TLOAD" => Some(Self::Tload),
            "TSTORE" => Some(Self::Tstore),
            _ => None,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::Sstore | Self::Tstore)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Tload | Self::Tstore)
    }
}

/// One storage access
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageOperation {
    pub pc: u64,
    pub depth: u64,
    /// Contract whose storage is accessed
    pub context: StorageContext,
    pub kind: StorageOpKind,
    pub slot: B256,
    /// Value read or written, when it can be recovered
    pub value: Option<B256>,
    /// Last value known for the slot before a write
    pub previous: Option<B256>,
    pub gas_cost: u64,
}

impl StorageOperation {
    /// Whether a write changed the slot's known value
    pub fn is_change(&self) -> bool {
        self.kind.is_write() && self.previous != self.value
    }
}

/// Storage accesses of one execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageAccessSummary {
    /// Operations in execution order
    pub operations: Vec<StorageOperation>,
    /// Last known persistent value per slot, grouped by contract
    pub final_state: BTreeMap<StorageContext, BTreeMap<B256, B256>>,
}

impl StorageAccessSummary {
    pub fn reads(&self) -> impl Iterator<Item = &StorageOperation> {
        self.operations.iter().filter(|op| !op.kind.is_write())
    }

    pub fn writes(&self) -> impl Iterator<Item = &StorageOperation> {
        self.operations.iter().filter(|op| op.kind.is_write())
    }

    /// Last known persistent value of `slot` in `context`
    pub fn final_value(&self, context: StorageContext, slot: B256) -> Option<B256> {
        self.final_state.get(&context).and_then(|slots| slots.get(&slot)).copied()
    }
}

/// Extracts storage operations from struct logs
///
/// # Arguments
/// * `logs` - Struct logs in execution order, with stacks enabled
/// * `root` - Contract executing at depth 1, when known
///
/// # Returns
/// * `Ok(StorageAccessSummary)` - Operations and final per-slot values
/// * `Err(AnalysisError::IncompleteStack)` - If a storage opcode lacks the
///   stack items it consumes
pub fn extract_storage_operations(
    logs: &[StructLog],
    root: Option<Address>,
) -> Result<StorageAccessSummary, AnalysisError> {
    let mut summary = StorageAccessSummary::default();
    let mut transient: BTreeMap<StorageContext, BTreeMap<B256, B256>> = BTreeMap::new();
    let mut contexts = ContextStack::new(root);

    for (index, log) in logs.iter().enumerate() {
        let context = contexts.enter(log.depth);
        contexts.observe(log);
        let Some(kind) = StorageOpKind::from_opcode(&log.op) else {
            continue;
        };
        let incomplete = || AnalysisError::IncompleteStack { pc: log.pc, op: log.op.clone() };
        let slot = B256::from(log.stack_peek(0).ok_or_else(incomplete)?);
        let known = if kind.is_transient() { &mut transient } else { &mut summary.final_state };
        let known = known.entry(context).or_default();

        let (value, previous) = if kind.is_write() {
            let value = B256::from(log.stack_peek(1).ok_or_else(incomplete)?);
            let previous = known.insert(slot, value);
            (Some(value), previous)
        } else {
            let value = loaded_value(logs, index, slot);
            if let Some(value) = value {
                known.insert(slot, value);
            }
            (value, None)
        };

        summary.operations.push(StorageOperation {
            pc: log.pc,
            depth: log.depth,
            context,
            kind,
            slot,
            value,
            previous,
            gas_cost: log.gas_cost,
        });
    }
    Ok(summary)
}

/// Value pushed by the load at `index`
///
/// The next step at the same depth has it on top of its stack. When stacks
/// are cut short, the step's storage snapshot is used instead.
fn loaded_value(logs: &[StructLog], index: usize, slot: B256) -> Option<B256> {
    let depth = logs[index].depth;
    logs.get(index + 1)
        .filter(|next| next.depth == depth)
        .and_then(|next| next.stack_peek(0))
        .map(B256::from)
        .or_else(|| logs[index].storage.as_ref().and_then(|storage| storage.get(&slot).copied()))
}

/// Gas split by opcode category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GasBreakdown {
    pub storage_reads: u64,
    pub storage_writes: u64,
    pub memory: u64,
    pub logs: u64,
    pub calls: u64,
    pub creates: u64,
    pub computation: u64,
    /// Refund counter at the end of execution
    pub refund: u64,
    /// Execution count per opcode
    pub opcode_counts: BTreeMap<String, u64>,
}

impl GasBreakdown {
    /// Sum over every category
    pub fn total(&self) -> u64 {
        [self.storage_reads, self.storage_writes, self.memory, self.logs, self.calls, self.creates, self.computation]
            .into_iter()
            .fold(0u64, u64::saturating_add)
    }

    /// Share of `category` in the total, in percent
    pub fn percentage(&self, category: u64) -> f64 {
        match self.total() {
            0 => 0.0,
            total => category as f64 * 100.0 / total as f64,
        }
    }
}

/// Splits the gas of a struct log trace into categories
///
/// `CALL*`/`CREATE*` costs include the gas forwarded to the callee as
/// reported by the tracer.
pub fn gas_breakdown(response: &StructLogResponse) -> GasBreakdown {
    let mut breakdown = GasBreakdown::default();
    for log in response.logs() {
        let cost = log.gas_cost;
        let op = log.op.as_str();
        let bucket = match op {
            "SLOAD" | "TLOAD" => &mut breakdown.storage_reads,
            "SSTORE" | "TSTORE" => &mut breakdown.storage_writes,
            "MLOAD" | "MSTORE" | "MSTORE8" | "MCOPY" | "CALLDATACOPY" | "CODECOPY" | "RETURNDATACOPY"
            | "EXTCODECOPY" => &mut breakdown.memory,
            "CALL" | "CALLCODE" | "DELEGATECALL" | "STATICCALL" => &mut breakdown.calls,
            "CREATE" | "CREATE2" => &mut breakdown.creates,
            op if op.starts_with("LOG") => &mut breakdown.logs,
            _ => &mut breakdown.computation,
        };
        *bucket = bucket.saturating_add(cost);
        *breakdown.opcode_counts.entry(op.to_string()).or_default() += 1;
    }
    breakdown.refund = response
        .refund_counter
        .or(response.total_gas_refunded)
        .or_else(|| response.logs().iter().rev().find_map(|log| log.refund))
        .unwrap_or_default();
    breakdown
}
