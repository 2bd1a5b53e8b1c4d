//! Access list endpoint

use tracing::debug;

use crate::{
    errors::Result,
    http::HttpClient,
    types::{AccessListRequest, AccessListResponse},
};

/// Client for `POST /simulate/access-list`
#[derive(Debug, Clone, Copy)]
pub struct AccessListClient<'a> {
    http: &'a HttpClient,
}

impl<'a> AccessListClient<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// Generates an EIP-2930 access list for a call
    ///
    /// A call that reverts still yields a response, with `error` set.
    pub async fn create(&self, request: &AccessListRequest) -> Result<AccessListResponse> {
        let response: AccessListResponse = self.http.post("/simulate/access-list", request).await?;
        debug!(
            target: "altitrace::access_list",
            addresses = response.address_count(),
            storage_keys = response.storage_key_count(),
            error = response.error.as_deref(),
            "Access list created"
        );
        Ok(response)
    }
}
