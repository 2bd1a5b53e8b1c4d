//! Sequential bundle execution
//!
//! A bundle is an ordered list of transactions where each one sees the state
//! left behind by the previous ones. Every step is:
//! 1. simulated on top of the cumulative state overrides
//! 2. traced with the prestate tracer in diff mode
//! 3. folded into the cumulative overrides via its post-state
//!
//! A failing step stops the bundle unless it is marked `allowFailure`; the
//! remaining steps are then reported as skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    builders::validate_batch_size,
    client::AltitraceClient,
    errors::Result,
    traits::GasUsage,
    types::{
        Address, BlockOverrides, BlockTag, PrestateTraceResponse, PrestateTracerConfig, SimulationOptions,
        SimulationParams, SimulationRequest, SimulationResult, SimulationStatus, StateOverride, TraceCallRequest,
        TraceConfig, TransactionCall, I256, U64,
    },
    utils::{
        state_utils::{merge_overrides, post_state_overrides, summarize_state_diff, StateDiffSummary},
        transfer_utils::TokenTransfer,
    },
};

fn default_true() -> bool {
    true
}

/// A transaction within a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleTransaction {
    pub call: TransactionCall,
    /// Keep executing the bundle when this transaction fails
    #[serde(default)]
    pub allow_failure: bool,
    /// Account whose assets are tracked, defaults to the bundle account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Address>,
    /// Free-form label shown in reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BundleTransaction {
    pub fn new(call: TransactionCall) -> Self {
        Self { call, allow_failure: false, account: None, label: None }
    }

    pub fn allow_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }
}

/// Bundle of interdependent transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    /// Transactions in execution order
    pub transactions: Vec<BundleTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_tag: Option<BlockTag>,
    /// Initial state overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_overrides: Option<BTreeMap<Address, StateOverride>>,
    /// Block overrides applied to every step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_overrides: Option<BlockOverrides>,
    /// Account whose assets are tracked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Address>,
    #[serde(default = "default_true")]
    pub trace_asset_changes: bool,
}

impl BundleRequest {
    pub fn new(transactions: Vec<BundleTransaction>) -> Self {
        Self {
            transactions,
            block_number: None,
            block_tag: None,
            state_overrides: None,
            block_overrides: None,
            account: None,
            trace_asset_changes: true,
        }
    }

    /// Block parameter for the trace endpoints
    fn trace_block(&self) -> String {
        match (self.block_number, self.block_tag) {
            (Some(number), _) => format!("0x{:x}", number.to::<u64>()),
            (None, Some(tag)) => tag.to_string(),
            (None, None) => BlockTag::Latest.to_string(),
        }
    }

    /// Account whose assets step `index` tracks
    fn tracked_account(&self, index: usize) -> Option<Address> {
        let transaction = &self.transactions[index];
        transaction.account.or(self.account).or(transaction.call.from)
    }

    /// Simulation request for step `index` on top of `overrides`
    fn step_request(&self, index: usize, overrides: &BTreeMap<Address, StateOverride>) -> SimulationRequest {
        let transaction = &self.transactions[index];
        let account = self.tracked_account(index);
        let track_assets = self.trace_asset_changes && account.is_some();
        let state_overrides: Vec<StateOverride> = overrides
            .iter()
            .map(|(address, state_override)| StateOverride { address: Some(*address), ..state_override.clone() })
            .collect();

        SimulationRequest {
            params: SimulationParams {
                calls: vec![transaction.call.clone()],
                account,
                block_number: self.block_number,
                block_tag: if self.block_number.is_some() { None } else { self.block_tag },
                // failures are expected for these, skip nonce/balance checks
                validation: !transaction.allow_failure,
                trace_asset_changes: track_assets,
                trace_transfers: track_assets,
            },
            options: Some(SimulationOptions {
                state_overrides: (!state_overrides.is_empty()).then_some(state_overrides),
                block_overrides: self.block_overrides.clone(),
            }),
        }
    }
}

/// Outcome of one bundle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    Success,
    Failed,
    /// Not executed because an earlier step failed
    Skipped,
}

/// Result of one bundle step
#[derive(Debug, Clone, Serialize)]
pub struct BundleStepResult {
    pub index: usize,
    pub label: Option<String>,
    pub status: StepStatus,
    pub allow_failure: bool,
    /// Account whose asset changes this step reports
    pub account: Option<Address>,
    pub simulation: Option<SimulationResult>,
    /// Reason of a failed step
    pub error: Option<String>,
    /// State changes carried into the next step
    pub state_diff: Option<StateDiffSummary>,
    /// Set when the state trace failed; later steps then miss this step's changes
    pub trace_error: Option<String>,
}

impl BundleStepResult {
    fn skipped(index: usize, request: &BundleRequest) -> Self {
        let transaction = &request.transactions[index];
        Self {
            index,
            label: transaction.label.clone(),
            status: StepStatus::Skipped,
            allow_failure: transaction.allow_failure,
            account: request.tracked_account(index),
            simulation: None,
            error: None,
            state_diff: None,
            trace_error: None,
        }
    }

    pub fn gas_used(&self) -> u64 {
        self.simulation.as_ref().map(GasUsage::gas_used).unwrap_or_default()
    }
}

/// Overall bundle outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BundleStatus {
    /// Every step succeeded
    Success,
    /// Some steps failed but were allowed to
    PartialSuccess,
    /// A step failed and stopped the bundle, or nothing succeeded
    Failed {
        step: usize,
        error: String,
    },
}

/// Aggregated bundle result
#[derive(Debug, Clone, Serialize)]
pub struct BundleResult {
    pub status: BundleStatus,
    pub steps: Vec<BundleStepResult>,
    /// Gas used by every executed step
    pub total_gas_used: u64,
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    /// Net balance change per tracked account and token over all steps, from
    /// the API's asset tracking
    pub asset_changes: BTreeMap<Address, BTreeMap<Address, I256>>,
    /// Fungible and native transfers of successful steps, in order
    pub transfers: Vec<TokenTransfer>,
}

impl BundleResult {
    /// Aggregates step results
    pub fn from_steps(steps: Vec<BundleStepResult>) -> Self {
        let count = |status: StepStatus| steps.iter().filter(|step| step.status == status).count();
        let (success_count, failed_count, skipped_count) =
            (count(StepStatus::Success), count(StepStatus::Failed), count(StepStatus::Skipped));

        let mut asset_changes: BTreeMap<Address, BTreeMap<Address, I256>> = BTreeMap::new();
        let mut transfers = Vec::new();
        for step in &steps {
            let Some(simulation) = step.simulation.as_ref() else { continue };
            if let Some(account) = step.account {
                let tokens = asset_changes.entry(account).or_default();
                for change in simulation.asset_changes.iter().flatten() {
                    let entry = tokens.entry(change.token.address).or_insert(I256::ZERO);
                    *entry = entry.saturating_add(change.value.signed_diff());
                }
            }
            if simulation.is_success() {
                transfers.extend(simulation.transfer_events());
            }
        }
        for tokens in asset_changes.values_mut() {
            tokens.retain(|_, delta| !delta.is_zero());
        }
        asset_changes.retain(|_, tokens| !tokens.is_empty());

        let first_failure = steps.iter().find(|step| step.status == StepStatus::Failed);
        let status = match first_failure {
            None if success_count > 0 => BundleStatus::Success,
            Some(_) if success_count > 0 && skipped_count == 0 && steps_allowed(&steps) => {
                BundleStatus::PartialSuccess
            }
            Some(failed) => BundleStatus::Failed {
                step: failed.index,
                error: failed.error.clone().unwrap_or_else(|| "transaction failed".to_string()),
            },
            None => BundleStatus::Failed { step: 0, error: "no transaction executed".to_string() },
        };

        Self {
            status,
            total_gas_used: steps.iter().map(BundleStepResult::gas_used).sum(),
            steps,
            success_count,
            failed_count,
            skipped_count,
            asset_changes,
            transfers,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BundleStatus::Success
    }

    /// Net change of `account` in `token` (zero when untouched)
    pub fn asset_change(&self, account: Address, token: Address) -> I256 {
        self.asset_changes.get(&account).and_then(|tokens| tokens.get(&token)).copied().unwrap_or(I256::ZERO)
    }
}

fn steps_allowed(steps: &[BundleStepResult]) -> bool {
    steps.iter().filter(|step| step.status == StepStatus::Failed).all(|step| step.allow_failure)
}

impl AltitraceClient {
    /// Executes a bundle step by step, carrying state forward
    ///
    /// # Errors
    /// Only request validation fails the whole call. Transport and API
    /// errors of a step are recorded as a failed step.
    pub async fn simulate_bundle(&self, request: &BundleRequest) -> Result<BundleResult> {
        validate_batch_size("bundle", request.transactions.len())?;
        let mut overrides = request.state_overrides.clone().unwrap_or_default();
        for state_override in overrides.values() {
            state_override.validate_state_exclusivity()?;
        }

        let mut steps = Vec::with_capacity(request.transactions.len());
        let mut stopped = false;
        for (index, transaction) in request.transactions.iter().enumerate() {
            if stopped {
                steps.push(BundleStepResult::skipped(index, request));
                continue;
            }

            let step = self.execute_step(request, index, &mut overrides).await;
            debug!(
                target: "altitrace::bundle",
                step = index,
                status = ?step.status,
                gas_used = step.gas_used(),
                "Bundle step finished"
            );
            if step.status == StepStatus::Failed && !transaction.allow_failure {
                warn!(target: "altitrace::bundle", step = index, error = step.error.as_deref(), "Bundle stopped");
                stopped = true;
            }
            steps.push(step);
        }

        Ok(BundleResult::from_steps(steps))
    }

    async fn execute_step(
        &self,
        request: &BundleRequest,
        index: usize,
        overrides: &mut BTreeMap<Address, StateOverride>,
    ) -> BundleStepResult {
        let transaction = &request.transactions[index];
        let mut step = BundleStepResult::skipped(index, request);

        let simulation = match self.simulation().simulate(&request.step_request(index, overrides)).await {
            Ok(simulation) => simulation,
            Err(error) => {
                step.status = StepStatus::Failed;
                step.error = Some(error.to_string());
                return step;
            }
        };

        let succeeded = simulation.status == SimulationStatus::Success;
        step.status = if succeeded { StepStatus::Success } else { StepStatus::Failed };
        if !succeeded {
            step.error = Some(
                simulation.revert_reasons().into_iter().next().unwrap_or_else(|| format!("{:?}", simulation.status)),
            );
        }
        step.simulation = Some(simulation);

        if succeeded || transaction.allow_failure {
            match self.trace_state_diff(request, index, overrides).await {
                Ok(Some((summary, post))) => {
                    merge_overrides(overrides, post);
                    step.state_diff = Some(summary);
                }
                Ok(None) => step.trace_error = Some("prestate tracer returned no diff".to_string()),
                Err(error) => {
                    warn!(target: "altitrace::bundle", step = index, %error, "State trace failed");
                    step.trace_error = Some(error.to_string());
                }
            }
        }
        step
    }

    /// Traces step `index` in diff mode and returns its summary and post-state
    async fn trace_state_diff(
        &self,
        request: &BundleRequest,
        index: usize,
        overrides: &BTreeMap<Address, StateOverride>,
    ) -> Result<Option<(StateDiffSummary, BTreeMap<Address, StateOverride>)>> {
        let trace_request = TraceCallRequest {
            call: request.transactions[index].call.clone(),
            block: request.trace_block(),
            tracer_config: TraceConfig {
                call_tracer: None,
                prestate_tracer: Some(PrestateTracerConfig { diff_mode: true, ..Default::default() }),
                ..Default::default()
            },
            state_overrides: (!overrides.is_empty()).then(|| overrides.clone()),
            block_overrides: request.block_overrides.clone(),
        };
        let response = self.trace().call(&trace_request).await?;
        Ok(match response.prestate_tracer {
            Some(PrestateTraceResponse::Diff(diff)) => Some((summarize_state_diff(&diff), post_state_overrides(&diff))),
            _ => None,
        })
    }
}
