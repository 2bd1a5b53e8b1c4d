//! Trace reconstruction utilities
//!
//! This module collection derives higher-level artifacts from raw API responses:
//! - **Call trees**: call counts, depth, logs, errors, error origin, gas per call type
//! - **Storage**: SLOAD/SSTORE operations recovered from struct logs, gas by opcode category
//! - **Transfers**: ERC20 and native transfers folded into per-account balance deltas
//! - **State diffs**: prestate diff summaries and post-state overrides
//! - **Access lists**: EIP-2930 gas comparison and recommendation
//! - **Errors**: revert payload decoding and node message normalisation
//! - **Retry**: bounded exponential backoff used by the HTTP client

pub mod access_list_utils;
pub mod call_utils;
pub mod error_utils;
pub mod retry_utils;
pub mod state_utils;
pub mod storage_utils;
pub mod transfer_utils;
