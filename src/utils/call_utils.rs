//! Call-frame tree analysis
//!
//! Walks a `callTracer` frame tree once and collects:
//! - Call count and maximum depth
//! - Logs in execution order, tagged with their trace address
//! - Failed frames and the error origin
//! - Gas attributed per call type
//! - Accessed accounts and native value transfers

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::{
    types::{Address, CallFrame, LogEntry, NATIVE_TRANSFER_ADDRESS},
    utils::{error_utils::resolve_revert_reason, transfer_utils::TokenTransfer},
};

/// Position of a frame in the call tree (child indices from the root)
pub type TraceAddress = Vec<usize>;

/// Call types that move native value
const VALUE_CALL_TYPES: [&str; 4] = ["CALL", "CALLCODE", "CREATE", "CREATE2"];

/// Log emitted by a frame, with the frame's position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracedLog {
    pub trace_address: TraceAddress,
    pub log: LogEntry,
}

/// A failed frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameError {
    pub trace_address: TraceAddress,
    pub call_type: String,
    pub depth: u32,
    pub from: Address,
    pub to: Option<Address>,
    /// Error reported by the tracer (e.g. `execution reverted`)
    pub error: Option<String>,
    /// Decoded revert reason, if any
    pub revert_reason: Option<String>,
}

impl FrameError {
    fn from_frame(frame: &CallFrame, trace_address: &[usize]) -> Self {
        Self {
            trace_address: trace_address.to_vec(),
            call_type: frame.kind(),
            depth: frame.depth,
            from: frame.from,
            to: frame.to,
            error: frame.error.clone(),
            revert_reason: resolve_revert_reason(
                frame.revert_reason.as_deref(),
                &frame.output,
                frame.error.as_deref(),
            ),
        }
    }

    /// Short description: the revert reason, then the raw error
    pub fn message(&self) -> String {
        self.revert_reason
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "reverted".to_string())
    }
}

/// Gas usage derived from a call tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallGasSummary {
    /// Gas used by the root frame
    pub total: u64,
    /// Gas used per call type, counting every frame's own `gasUsed`
    pub by_call_type: BTreeMap<String, u64>,
}

/// Everything derived from one call tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallTraceSummary {
    pub total_calls: usize,
    pub max_depth: u32,
    pub logs: Vec<TracedLog>,
    pub errors: Vec<FrameError>,
    /// The deepest failure whose children all succeeded
    pub error_origin: Option<FrameError>,
    pub gas: CallGasSummary,
    /// Every `from`/`to`, deduplicated, in first-seen order
    pub accessed_accounts: Vec<Address>,
    /// Native value moved by successful frames
    pub value_transfers: Vec<TokenTransfer>,
}

impl CallTraceSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Summarises a call tree
///
/// # Arguments
/// * `root` - Root frame returned by the call tracer
///
/// # Returns
/// A [`CallTraceSummary`] built in a single pre-order walk
pub fn summarize_call_tree(root: &CallFrame) -> CallTraceSummary {
    let mut walker = Walker::default();
    walker.visit(root, &mut Vec::new(), false);

    let error_origin =
        find_error_origin(root).map(|(trace_address, frame)| FrameError::from_frame(frame, &trace_address));

    CallTraceSummary {
        total_calls: walker.total_calls,
        max_depth: walker.max_depth,
        logs: walker.logs,
        errors: walker.errors,
        error_origin,
        gas: CallGasSummary { total: root.gas_used_u64(), by_call_type: walker.gas_by_type },
        accessed_accounts: walker.accounts,
        value_transfers: walker.transfers,
    }
}

#[derive(Default)]
struct Walker {
    total_calls: usize,
    max_depth: u32,
    logs: Vec<TracedLog>,
    errors: Vec<FrameError>,
    gas_by_type: BTreeMap<String, u64>,
    seen: HashSet<Address>,
    accounts: Vec<Address>,
    transfers: Vec<TokenTransfer>,
}

impl Walker {
    fn visit(&mut self, frame: &CallFrame, trace_address: &mut TraceAddress, parent_failed: bool) {
        self.total_calls += 1;
        // depth is relative to the root, whatever the tracer reports
        self.max_depth = self.max_depth.max(u32::try_from(trace_address.len()).unwrap_or(u32::MAX));

        let kind = frame.kind();
        let gas = self.gas_by_type.entry(kind.clone()).or_default();
        *gas = gas.saturating_add(frame.gas_used_u64());

        self.touch(frame.from);
        if let Some(to) = frame.to {
            self.touch(to);
        }

        for log in &frame.logs {
            self.logs.push(TracedLog { trace_address: trace_address.clone(), log: log.clone() });
        }

        let failed = parent_failed || frame.is_failed();
        if frame.is_failed() {
            self.errors.push(FrameError::from_frame(frame, trace_address));
        }

        if !failed && !frame.value.is_zero() && VALUE_CALL_TYPES.contains(&kind.as_str()) {
            if let Some(to) = frame.to {
                self.transfers.push(TokenTransfer {
                    token: NATIVE_TRANSFER_ADDRESS,
                    from: frame.from,
                    to,
                    value: frame.value,
                });
            }
        }

        for (index, child) in frame.calls.iter().enumerate() {
            trace_address.push(index);
            self.visit(child, trace_address, failed);
            trace_address.pop();
        }
    }

    fn touch(&mut self, account: Address) {
        if self.seen.insert(account) {
            self.accounts.push(account);
        }
    }
}

/// Finds the frame where a failure originated
///
/// A frame is an error origin when it failed and none of its children did.
/// The search only descends into failed frames and returns the last origin
/// in depth-first order.
///
/// # Returns
/// * `Some((trace_address, frame))` - The origin frame and its position
/// * `None` - If the tree contains no failure reachable from the root
pub fn find_error_origin(root: &CallFrame) -> Option<(TraceAddress, &CallFrame)> {
    fn find_recursive<'a>(frame: &'a CallFrame, path: &mut TraceAddress) -> Option<(TraceAddress, &'a CallFrame)> {
        let mut last_error = None;
        for (index, child) in frame.calls.iter().enumerate() {
            if child.is_failed() {
                path.push(index);
                if let Some(found) = find_recursive(child, path) {
                    last_error = Some(found);
                }
                path.pop();
            }
        }
        last_error.or_else(|| Some((path.clone(), frame)))
    }

    if !root.is_failed() {
        return None;
    }
    find_recursive(root, &mut Vec::new())
}

/// Flattens a call tree into `(trace_address, frame)` pairs in pre-order
pub fn flatten_frames(root: &CallFrame) -> Vec<(TraceAddress, &CallFrame)> {
    fn collect<'a>(frame: &'a CallFrame, path: &mut TraceAddress, out: &mut Vec<(TraceAddress, &'a CallFrame)>) {
        out.push((path.clone(), frame));
        for (index, child) in frame.calls.iter().enumerate() {
            path.push(index);
            collect(child, path, out);
            path.pop();
        }
    }

    let mut frames = Vec::new();
    collect(root, &mut Vec::new(), &mut frames);
    frames
}
