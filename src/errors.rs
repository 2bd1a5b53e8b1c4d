//! Error types for the Altitrace client and trace analysis
//!
//! This module defines a comprehensive error handling system that covers:
//! - Transport and HTTP errors raised by the API client
//! - Request validation errors raised by the builders
//! - Analysis errors raised while reconstructing traces
//! - Error conversion and propagation

use thiserror::Error;

/// Top-level error type for the Altitrace SDK
///
/// Encompasses all possible errors that can occur while talking to the API
/// or post-processing its responses, providing a unified error handling
/// interface for users.
#[derive(Debug, Error)]
pub enum AltitraceError {
    /// Errors occurring while talking to the remote API
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Errors occurring while building a request
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Errors occurring while reconstructing trace results
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

/// Client transport errors
///
/// These errors occur while sending a request or decoding the response
/// envelope returned by the API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid or malformed API base URL
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Underlying transport failure (DNS, connection reset, TLS...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout
    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
    },

    /// The API answered with a non-success HTTP status
    ///
    /// # Fields
    /// * `status` - HTTP status code
    /// * `body` - Raw response body, truncated
    #[error("HTTP {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The API answered with `success: false`
    ///
    /// # Fields
    /// * `code` - Machine-readable error code (e.g. `SIMULATION_FAILED`)
    /// * `message` - Human-readable message
    /// * `suggestion` - Optional hint returned by the API
    #[error("API error {code}: {message}")]
    Api {
        code: String,
        message: String,
        suggestion: Option<String>,
    },

    /// The response body could not be decoded
    #[error("Failed to decode response from {endpoint}: {reason}")]
    Decode {
        endpoint: String,
        reason: String,
    },

    /// Every retry attempt failed
    #[error("Giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<ClientError>,
    },
}

impl ClientError {
    /// Whether the failure is transient and worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RetriesExhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }
}

/// Request validation errors
///
/// Raised by the request builders before anything is sent over the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// No transaction call was supplied
    #[error("At least one call is required")]
    NoCalls,

    /// Both a block number and a block tag were supplied
    #[error("Cannot specify both 'blockNumber' and 'blockTag' - they are mutually exclusive")]
    BlockExclusivity,

    /// Asset tracing was requested without an account to trace
    #[error("Account parameter is required when traceAssetChanges or traceTransfers is enabled")]
    MissingAccount,

    /// A state override carries both `state` and `stateDiff`
    #[error("State override for {address} cannot specify both 'state' and 'stateDiff'")]
    StateExclusivity {
        address: String,
    },

    /// A batch or bundle is empty or too large
    #[error("{kind} must contain {min}-{max} entries, got {actual}")]
    InvalidSize {
        kind: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    /// A required field was not set on a builder
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field value could not be parsed
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

/// Trace analysis errors
///
/// These errors occur when a trace response does not carry the data an
/// analysis step needs.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The requested tracer output is absent from the response
    #[error("Tracer output missing: {0}")]
    MissingTracer(&'static str),

    /// The prestate tracer ran in default mode where diff mode is required
    #[error("Prestate trace is not in diff mode")]
    NotDiffMode,

    /// A struct log entry did not carry the stack it needs
    #[error("Struct log at pc {pc} ({op}) has an incomplete stack")]
    IncompleteStack {
        pc: u64,
        op: String,
    },
}

/// Convenience result alias used across the crate
pub type Result<T, E = AltitraceError> = std::result::Result<T, E>;
