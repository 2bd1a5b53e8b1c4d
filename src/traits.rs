//! Response extensions
//!
//! Derived getters attached to decoded API responses:
//! - [`GasUsage`] for anything that reports gas
//! - inherent helpers on [`SimulationResult`], [`CallResult`] and [`TracerResponse`]
//!
//! The analysis helpers on [`TracerResponse`] delegate to [`crate::utils`].

use std::collections::BTreeMap;

use crate::{
    errors::AnalysisError,
    types::{
        Address, AssetChange, CallFrame, CallResult, CallStatus, EnhancedLog, SimulationResult, SimulationStatus,
        TracerResponse, I256,
    },
    utils::{
        call_utils::{summarize_call_tree, CallTraceSummary},
        error_utils::{extract_revert_reason, parse_custom_error},
        state_utils::{summarize_prestate, StateDiffSummary},
        storage_utils::{extract_storage_operations, gas_breakdown, GasBreakdown, StorageAccessSummary},
        transfer_utils::{transfer_from_log, TokenTransfer},
    },
};

/// Gas consumed by an execution result
pub trait GasUsage {
    fn gas_used(&self) -> u64;
}

impl GasUsage for SimulationResult {
    fn gas_used(&self) -> u64 {
        self.gas_used.saturating_to()
    }
}

impl GasUsage for CallResult {
    fn gas_used(&self) -> u64 {
        self.gas_used.saturating_to()
    }
}

impl GasUsage for CallFrame {
    fn gas_used(&self) -> u64 {
        self.gas_used_u64()
    }
}

/// Gas of the traced transaction
///
/// Prefers the receipt, then the root call frame, then the struct logger.
impl GasUsage for TracerResponse {
    fn gas_used(&self) -> u64 {
        if let Some(receipt) = &self.receipt {
            return receipt.gas_used.saturating_to();
        }
        if let Some(call) = &self.call_tracer {
            return call.root_call.gas_used_u64();
        }
        self.struct_logger.as_ref().map(|logs| logs.total_gas).unwrap_or_default()
    }
}

impl GasUsage for crate::bundle::BundleResult {
    fn gas_used(&self) -> u64 {
        self.total_gas_used
    }
}

impl SimulationResult {
    pub fn is_success(&self) -> bool {
        self.status == SimulationStatus::Success
    }

    /// Gas used by all calls
    pub fn total_gas_used(&self) -> u64 {
        GasUsage::gas_used(self)
    }

    pub fn failed_calls(&self) -> impl Iterator<Item = &CallResult> {
        self.calls.iter().filter(|call| !call.is_success())
    }

    /// Logs of every call, in execution order
    pub fn all_logs(&self) -> impl Iterator<Item = &EnhancedLog> {
        self.calls.iter().flat_map(|call| call.logs.iter())
    }

    /// Fungible and native transfers decoded from `Transfer` logs
    pub fn transfer_events(&self) -> Vec<TokenTransfer> {
        self.all_logs()
            .filter_map(|log| transfer_from_log(log.address, &log.topics, &log.data))
            .collect()
    }

    /// Asset change of the traced account for `token`
    pub fn asset_change_for(&self, token: Address) -> Option<&AssetChange> {
        self.asset_changes.as_ref()?.iter().find(|change| change.token.address == token)
    }

    /// Signed balance change per token of the traced account
    pub fn asset_deltas(&self) -> BTreeMap<Address, I256> {
        self.asset_changes
            .iter()
            .flatten()
            .map(|change| (change.token.address, change.value.signed_diff()))
            .collect()
    }

    /// Revert reasons of the failed calls, in call order
    pub fn revert_reasons(&self) -> Vec<String> {
        self.failed_calls().filter_map(CallResult::revert_reason).collect()
    }
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        self.status == CallStatus::Success
    }

    pub fn gas_used(&self) -> u64 {
        GasUsage::gas_used(self)
    }

    /// Revert reason of a failed call
    ///
    /// Uses the API's error details, then decodes the return data.
    pub fn revert_reason(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        match &self.error {
            Some(error) if !error.reason.is_empty() => Some(extract_revert_reason(&error.reason)),
            Some(error) => parse_custom_error(&self.return_data)
                .or_else(|| error.message.as_deref().map(extract_revert_reason)),
            None => parse_custom_error(&self.return_data),
        }
    }
}

impl TracerResponse {
    /// Summary of the call tree, when the call tracer ran
    pub fn call_summary(&self) -> Option<CallTraceSummary> {
        self.call_tracer.as_ref().map(|trace| summarize_call_tree(&trace.root_call))
    }

    /// Storage reads and writes from the struct logger
    ///
    /// The root contract is taken from the call tracer when it ran.
    ///
    /// # Errors
    /// [`AnalysisError::MissingTracer`] when the struct logger did not run
    pub fn storage_operations(&self) -> Result<StorageAccessSummary, AnalysisError> {
        let logger = self.struct_logger.as_ref().ok_or(AnalysisError::MissingTracer("structLogger"))?;
        let root = self.call_tracer.as_ref().and_then(|trace| trace.root_call.to);
        extract_storage_operations(logger.logs(), root)
    }

    /// Account and storage changes from a diff-mode prestate trace
    pub fn state_diff_summary(&self) -> Result<StateDiffSummary, AnalysisError> {
        let prestate = self.prestate_tracer.as_ref().ok_or(AnalysisError::MissingTracer("prestateTracer"))?;
        summarize_prestate(prestate)
    }

    pub fn gas_breakdown(&self) -> Result<GasBreakdown, AnalysisError> {
        self.struct_logger.as_ref().map(gas_breakdown).ok_or(AnalysisError::MissingTracer("structLogger"))
    }

    /// Whether the receipt, the call tree or the struct logger report a failure
    pub fn has_errors(&self) -> bool {
        self.receipt.as_ref().is_some_and(|receipt| !receipt.status)
            || self.call_tracer.as_ref().is_some_and(|trace| {
                trace.root_call.is_failed() || summarize_call_tree(&trace.root_call).has_errors()
            })
            || self.struct_logger.as_ref().is_some_and(|logs| logs.error.is_some())
    }
}
