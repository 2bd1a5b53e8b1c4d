//! Altitrace API client
//!
//! [`AltitraceClient`] owns the HTTP transport and hands out resource clients:
//! - [`SimulationClient`] via [`AltitraceClient::simulation`]
//! - [`TraceClient`] via [`AltitraceClient::trace`]
//! - [`AccessListClient`] via [`AltitraceClient::access_list`]
//!
//! It also runs the multi-request workflows:
//! - [`AltitraceClient::simulate_with_trace`]: simulation, trace and access list in parallel
//! - [`AltitraceClient::compare_access_list`]: gas with and without an access list
//! - [`AltitraceClient::simulate_bundle`]: sequential bundle execution (see [`crate::bundle`])

mod access_list;
mod simulation;
mod trace;

pub use access_list::AccessListClient;
pub use simulation::SimulationClient;
pub use trace::TraceClient;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    builders::{AccessListRequestBuilder, SimulationRequestBuilder},
    config::ClientConfig,
    errors::Result,
    http::HttpClient,
    traits::GasUsage,
    types::{
        AccessListResponse, BlockTag, PrestateTracerConfig, SimulationRequest, SimulationResult, TraceCallRequest,
        TraceConfig, TracerResponse, TransactionCall,
    },
    utils::access_list_utils::{compare_gas_usage, AccessListComparison},
};

/// Entry point of the SDK
///
/// # Example
/// ```no_run
/// use altitrace::{AltitraceClient, ClientConfig};
///
/// # async fn example() -> Result<(), altitrace::AltitraceError> {
/// let client = AltitraceClient::new(ClientConfig::new("https://api.altitrace.example/v1")?)?;
/// let trace = client
///     .trace()
///     .transaction(&altitrace::types::TraceTransactionRequest {
///         transaction_hash: Default::default(),
///         tracer_config: Default::default(),
///     })
///     .await?;
/// println!("has errors: {}", trace.has_errors());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AltitraceClient {
    http: HttpClient,
}

impl AltitraceClient {
    /// Creates a client from `config`
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self { http: HttpClient::new(config)? })
    }

    /// Creates a client configured from `ALTITRACE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Creates a client for `base_url` with default settings
    pub fn with_url(base_url: &str) -> Result<Self> {
        Self::new(ClientConfig::new(base_url)?)
    }

    pub fn config(&self) -> &ClientConfig {
        self.http.config()
    }

    pub fn simulation(&self) -> SimulationClient<'_> {
        SimulationClient::new(&self.http)
    }

    pub fn trace(&self) -> TraceClient<'_> {
        TraceClient::new(&self.http)
    }

    pub fn access_list(&self) -> AccessListClient<'_> {
        AccessListClient::new(&self.http)
    }

    /// Simulates, traces and generates an access list for one call
    ///
    /// The three requests run concurrently. The simulation must succeed;
    /// trace and access list failures are recorded in the result.
    ///
    /// # Arguments
    /// * `call` - Call to analyse; its `from` is used as the traced account
    /// * `block` - Block to execute on
    pub async fn simulate_with_trace(&self, call: TransactionCall, block: BlockTag) -> Result<ComprehensiveResult> {
        let simulation_request = single_call_simulation(call.clone(), block)?;
        let trace_request = TraceCallRequest {
            call: call.clone(),
            block: block.to_string(),
            tracer_config: TraceConfig {
                prestate_tracer: Some(PrestateTracerConfig { diff_mode: true, ..Default::default() }),
                ..Default::default()
            },
            state_overrides: None,
            block_overrides: None,
        };
        let access_list_request = AccessListRequestBuilder::new().call(call).block_tag(block).build()?;

        let simulation = self.simulation();
        let trace = self.trace();
        let access_list = self.access_list();
        let (simulation, trace, access_list) = tokio::join!(
            simulation.simulate(&simulation_request),
            trace.call(&trace_request),
            access_list.create(&access_list_request),
        );

        let simulation = simulation?;
        let (trace, trace_error) = split_part("trace", trace);
        let (access_list, access_list_error) = split_part("access list", access_list);

        Ok(ComprehensiveResult { simulation, trace, trace_error, access_list, access_list_error })
    }

    /// Measures the gas impact of an access list on `call`
    ///
    /// Runs the baseline simulation and access list generation in parallel,
    /// then simulates again with the list applied. When list generation
    /// reports an error, the second simulation is skipped.
    pub async fn compare_access_list(&self, call: TransactionCall, block: BlockTag) -> Result<AccessListReport> {
        let baseline_request = single_call_simulation(call.clone(), block)?;
        let access_list_request = AccessListRequestBuilder::new().call(call.clone()).block_tag(block).build()?;

        let simulation = self.simulation();
        let access_list = self.access_list();
        let (baseline, generated) = tokio::join!(
            simulation.simulate(&baseline_request),
            access_list.create(&access_list_request),
        );
        let baseline = baseline?;
        let generated = generated?;

        if let Some(error) = &generated.error {
            warn!(target: "altitrace::access_list", %error, "Access list generation failed, skipping comparison");
            return Ok(AccessListReport {
                baseline,
                optimized: None,
                error: Some(error.clone()),
                access_list: generated,
                comparison: None,
            });
        }

        let optimized_request = single_call_simulation(call.with_access_list(generated.access_list.clone()), block)?;
        let optimized = simulation.simulate(&optimized_request).await?;
        let comparison = compare_gas_usage(baseline.gas_used(), optimized.gas_used(), &generated.access_list);
        debug!(
            target: "altitrace::access_list",
            gas_without = comparison.gas_without,
            gas_with = comparison.gas_with,
            recommendation = %comparison.recommendation,
            "Access list comparison completed"
        );

        Ok(AccessListReport {
            baseline,
            optimized: Some(optimized),
            error: None,
            access_list: generated,
            comparison: Some(comparison),
        })
    }
}

/// Builds a one-call simulation, tracing assets of `call.from` when set
pub(crate) fn single_call_simulation(call: TransactionCall, block: BlockTag) -> Result<SimulationRequest> {
    let builder = SimulationRequestBuilder::new().block_tag(block);
    let builder = match call.from {
        Some(from) => builder.account(from),
        None => builder.without_asset_tracing(),
    };
    Ok(builder.call(call).build()?)
}

fn split_part<T>(part: &'static str, result: Result<T>) -> (Option<T>, Option<String>) {
    match result {
        Ok(value) => (Some(value), None),
        Err(error) => {
            warn!(target: "altitrace::client", part, %error, "Partial failure");
            (None, Some(error.to_string()))
        }
    }
}

/// Simulation, trace and access list of a single call
#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveResult {
    pub simulation: SimulationResult,
    pub trace: Option<TracerResponse>,
    pub trace_error: Option<String>,
    pub access_list: Option<AccessListResponse>,
    pub access_list_error: Option<String>,
}

impl ComprehensiveResult {
    /// Whether every part succeeded
    pub fn is_complete(&self) -> bool {
        self.trace.is_some() && self.access_list.is_some()
    }
}

/// Outcome of [`AltitraceClient::compare_access_list`]
#[derive(Debug, Clone, Serialize)]
pub struct AccessListReport {
    /// Simulation without an access list
    pub baseline: SimulationResult,
    /// Simulation with the generated list applied
    pub optimized: Option<SimulationResult>,
    /// Error reported by list generation
    pub error: Option<String>,
    pub access_list: AccessListResponse,
    pub comparison: Option<AccessListComparison>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::{AltitraceError, ValidationError},
        types::Address,
    };

    #[test]
    fn test_single_call_simulation_tracks_sender() {
        let sender = Address::with_last_byte(0xa1);
        let call = TransactionCall { from: Some(sender), ..Default::default() };
        let request = single_call_simulation(call, BlockTag::Safe).unwrap();
        assert_eq!(request.params.account, Some(sender));
        assert_eq!(request.params.block_tag, Some(BlockTag::Safe));
        assert!(request.params.trace_asset_changes);

        let anonymous = single_call_simulation(TransactionCall::default(), BlockTag::Latest).unwrap();
        assert_eq!(anonymous.params.account, None);
        assert!(!anonymous.params.trace_asset_changes && !anonymous.params.trace_transfers);
    }

    #[test]
    fn test_invalid_request_fails_before_sending() {
        // nothing listens here; validation must reject the request first
        let client = AltitraceClient::with_url("http://127.0.0.1:9/v1").unwrap();
        let request = SimulationRequest { params: Default::default(), options: None };
        let error = tokio_test::block_on(client.simulation().simulate(&request)).unwrap_err();
        assert!(matches!(error, AltitraceError::Validation(ValidationError::NoCalls)));
    }
}
