//! HTTP transport for the Altitrace API
//!
//! [`HttpClient`] wraps a `reqwest::Client` configured from [`ClientConfig`]:
//! - JSON `POST` requests against endpoints under the configured base URL
//! - Per-request timeout, bearer authentication and user agent
//! - Bounded exponential backoff with `Retry-After` support
//! - Decoding of the standard response envelope

use std::{sync::Arc, time::{Duration, Instant}};

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER},
    Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, trace};

use crate::{
    config::ClientConfig,
    errors::ClientError,
    types::ApiResponse,
    utils::retry_utils::{retry_with_backoff, AttemptError},
};

/// Maximum number of body characters kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// Low-level API transport
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl HttpClient {
    /// Creates a transport from `config`
    ///
    /// # Errors
    /// `ClientError::Config` if the API key is not a valid header value or
    /// the TLS backend cannot be initialised
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| ClientError::Config(format!("invalid API key: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let inner = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { inner, config: Arc::new(config) })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends `body` to `path` and decodes the envelope's payload
    ///
    /// # Arguments
    /// * `path` - Endpoint path relative to the base URL (e.g. `/simulate`)
    /// * `body` - JSON request body
    ///
    /// # Returns
    /// * `Ok(T)` - Decoded `data` of a successful response
    /// * `Err(ClientError)` - Transport, status, envelope or decode failure
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path)?;
        let started = Instant::now();
        debug!(target: "altitrace::client", endpoint = path, "Sending request");

        let result = retry_with_backoff(&self.config.retry, path, |attempt| {
            let url = url.clone();
            async move {
                trace!(target: "altitrace::client", endpoint = path, attempt, "Attempt started");
                let response = self
                    .inner
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| AttemptError::from(self.transport_error(path, e)))?;
                self.decode(path, response).await
            }
        })
        .await;

        debug!(
            target: "altitrace::client",
            endpoint = path,
            elapsed_ms = started.elapsed().as_millis() as u64,
            success = result.is_ok(),
            "Request finished"
        );
        result
    }

    fn transport_error(&self, endpoint: &str, error: reqwest::Error) -> ClientError {
        if error.is_timeout() {
            ClientError::Timeout { endpoint: endpoint.to_string(), timeout_ms: self.config.timeout_ms }
        } else {
            ClientError::Transport(error.to_string())
        }
    }

    async fn decode<T: DeserializeOwned>(&self, endpoint: &str, response: Response) -> Result<T, AttemptError> {
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.bytes().await.map_err(|e| AttemptError::from(self.transport_error(endpoint, e)))?;

        if !status.is_success() {
            return Err(AttemptError {
                error: status_error(&self.config, endpoint, status, &body),
                retry_after,
            });
        }

        let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|e| ClientError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        Ok(envelope.into_result()?)
    }
}

/// Maps a non-success response to an error
///
/// Retryable statuses always surface as `Status` so the retry loop sees
/// them. Other responses carrying an error envelope become `Api` errors.
fn status_error(config: &ClientConfig, endpoint: &str, status: StatusCode, body: &[u8]) -> ClientError {
    if !config.retry.should_retry_status(status.as_u16()) {
        if let Ok(envelope) = serde_json::from_slice::<ApiResponse<serde_json::Value>>(body) {
            if let Some(error) = envelope.error {
                return ClientError::Api { code: error.code, message: error.message, suggestion: error.suggestion };
            }
        }
    }
    ClientError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).chars().take(MAX_ERROR_BODY).collect(),
    }
}

/// Parses a `Retry-After` header given in seconds
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_status_error_prefers_envelope() {
        let config = ClientConfig::default();
        let body = br#"{"success":false,"error":{"code":"VALIDATION_ERROR","message":"bad address"}}"#;
        match status_error(&config, "/simulate", StatusCode::BAD_REQUEST, body) {
            ClientError::Api { code, .. } => assert_eq!(code, "VALIDATION_ERROR"),
            other => panic!("unexpected error: {other:?}"),
        }

        match status_error(&config, "/simulate", StatusCode::SERVICE_UNAVAILABLE, body) {
            ClientError::Status { status, .. } => assert_eq!(status, 503),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_api_key_is_rejected() {
        let config = ClientConfig::default().with_api_key("bad\nkey");
        assert!(matches!(HttpClient::new(config), Err(ClientError::Config(_))));
    }
}
