//! Trace endpoints

use crate::{
    builders::{validate_batch_size, TraceRequest},
    errors::{Result, ValidationError},
    http::HttpClient,
    types::{TraceCallManyRequest, TraceCallRequest, TraceTransactionRequest, TracerResponse},
};

/// Client for `POST /trace/tx`, `/trace/call` and `/trace/call-many`
#[derive(Debug, Clone, Copy)]
pub struct TraceClient<'a> {
    http: &'a HttpClient,
}

impl<'a> TraceClient<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// Traces a mined transaction
    pub async fn transaction(&self, request: &TraceTransactionRequest) -> Result<TracerResponse> {
        Ok(self.http.post("/trace/tx", request).await?)
    }

    /// Traces a call on top of a block, with optional overrides
    pub async fn call(&self, request: &TraceCallRequest) -> Result<TracerResponse> {
        for state_override in request.state_overrides.iter().flat_map(|overrides| overrides.values()) {
            state_override.validate_state_exclusivity()?;
        }
        Ok(self.http.post("/trace/call", request).await?)
    }

    /// Traces bundles of calls executed one after another
    ///
    /// Returns one response per transaction, in execution order.
    pub async fn call_many(&self, request: &TraceCallManyRequest) -> Result<Vec<TracerResponse>> {
        validate_batch_size("bundles", request.bundles.len())?;
        if request.bundles.iter().any(|bundle| bundle.transactions.is_empty()) {
            return Err(ValidationError::NoCalls.into());
        }
        Ok(self.http.post("/trace/call-many", request).await?)
    }

    /// Sends a request produced by [`crate::builders::TraceRequestBuilder`]
    ///
    /// `call-many` responses are returned as-is; single traces yield one item.
    pub async fn send(&self, request: &TraceRequest) -> Result<Vec<TracerResponse>> {
        match request {
            TraceRequest::Transaction(request) => Ok(vec![self.transaction(request).await?]),
            TraceRequest::Call(request) => Ok(vec![self.call(request).await?]),
            TraceRequest::CallMany(request) => self.call_many(request).await,
        }
    }
}
