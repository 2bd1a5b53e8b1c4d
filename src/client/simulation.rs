//! Simulation endpoints

use tracing::debug;

use crate::{
    builders::{validate_batch_size, validate_simulation_request},
    errors::Result,
    http::HttpClient,
    types::{SimulationRequest, SimulationResult},
};

/// Client for `POST /simulate` and `POST /simulate/batch`
#[derive(Debug, Clone, Copy)]
pub struct SimulationClient<'a> {
    http: &'a HttpClient,
}

impl<'a> SimulationClient<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// Simulates the calls of `request` in one block
    ///
    /// The request is validated locally first.
    pub async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResult> {
        validate_simulation_request(request)?;
        let result: SimulationResult = self.http.post("/simulate", request).await?;
        debug!(
            target: "altitrace::simulation",
            simulation_id = %result.simulation_id,
            status = ?result.status,
            gas_used = result.gas_used.to::<u64>(),
            "Simulation completed"
        );
        Ok(result)
    }

    /// Runs 1 to 10 independent simulations
    ///
    /// Results come back in request order.
    pub async fn simulate_batch(&self, requests: &[SimulationRequest]) -> Result<Vec<SimulationResult>> {
        validate_batch_size("batch", requests.len())?;
        for request in requests {
            validate_simulation_request(request)?;
        }
        Ok(self.http.post("/simulate/batch", requests).await?)
    }
}
