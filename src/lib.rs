//! # Altitrace SDK
//!
//! Typed client for the Altitrace EVM simulation and tracing API, plus the
//! tooling that turns raw traces into something readable.
//!
//! ## Core Features
//!
//! - **API Client**
//!   - Simulation, batch simulation and access list endpoints
//!   - Transaction, call and multi-bundle tracing
//!   - Bounded exponential backoff with `Retry-After` support
//!   - Typed request builders with local validation
//!
//! - **Trace Reconstruction**
//!   - Call tree walks (logs, errors, gas, depth, accessed accounts)
//!   - Storage reads/writes from struct logs
//!   - Native and ERC20 balance deltas from transfers
//!   - Prestate diff summaries
//!
//! - **Workflows**
//!   - Simulation, trace and access list of one call in parallel
//!   - Access list gas comparison with a recommendation
//!   - Sequential bundle execution with state carried forward
//!
//! ## Features
//!
//! - `rustls-tls`: Uses rustls as the TLS implementation instead of native-tls (OpenSSL).
//!
//!   Usage example:
//!   ```toml
//!   [dependencies]
//!   altitrace = { version = "0.3.0", default-features = false, features = ["rustls-tls"] }
//!   ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use altitrace::{AltitraceClient, ClientConfig, SimulationRequestBuilder, TransactionCallBuilder};
//! use altitrace::types::BlockTag;
//! use alloy::primitives::{address, U256};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = AltitraceClient::new(ClientConfig::new("http://localhost:8080/v1")?)?;
//!
//! let sender = address!("C255fC198eEdAC7AF8aF0f6e0ca781794B094A61");
//! let call = TransactionCallBuilder::new()
//!     .from(sender)
//!     .to(address!("d878229c9c3575F224784DE610911B5607a3ad15"))
//!     .value(U256::from(120000000000000000u64)) // 0.12 ETH
//!     .build();
//!
//! let request = SimulationRequestBuilder::new()
//!     .call(call.clone())
//!     .account(sender)
//!     .block_tag(BlockTag::Latest)
//!     .build()?;
//! let result = client.simulation().simulate(&request).await?;
//!
//! if result.is_success() {
//!     println!("Gas used: {}", result.total_gas_used());
//!     for transfer in result.transfer_events() {
//!         println!("Transfer: {} from {} to {}", transfer.value, transfer.from, transfer.to);
//!     }
//! } else {
//!     for reason in result.revert_reasons() {
//!         println!("Reverted: {reason}");
//!     }
//! }
//!
//! let report = client.compare_access_list(call, BlockTag::Latest).await?;
//! if let Some(comparison) = report.comparison {
//!     println!("Access list: {}", comparison.recommendation);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - `client`: API client, resource clients and multi-request workflows
//! - `bundle`: Sequential bundle execution
//! - `builders`: Fluent request builders and validation
//! - `http`: Transport with retries
//! - `types`: Wire model of the API
//! - `traits`: Response extensions
//! - `config`: Client configuration
//! - `errors`: Error types and handling
//! - `utils`: Trace reconstruction helpers

pub mod builders;
pub mod bundle;
pub mod client;
pub mod config;
pub mod errors;
pub mod http;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export only the essential types and functions
pub use builders::{AccessListRequestBuilder, SimulationRequestBuilder, TraceRequestBuilder, TransactionCallBuilder};
pub use bundle::{BundleRequest, BundleResult, BundleTransaction};
pub use client::AltitraceClient;
pub use config::{ClientConfig, RetryConfig};
pub use errors::{AltitraceError, AnalysisError, ClientError, ValidationError};
pub use traits::GasUsage;
