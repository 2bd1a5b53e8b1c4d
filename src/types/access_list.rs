//! Access list request and response types (`POST /simulate/access-list`)

use serde::{Deserialize, Serialize};

use super::{AccessList, TransactionCall, U64};

/// Request body of `POST /simulate/access-list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListRequest {
    /// Call to generate the list for
    pub params: TransactionCall,
    /// Block tag or hex number
    #[serde(default = "latest")]
    pub block: String,
}

fn latest() -> String {
    "latest".to_string()
}

/// Generated EIP-2930 access list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListResponse {
    #[serde(default)]
    pub access_list: AccessList,
    /// Gas used by the call with the list applied
    #[serde(default)]
    pub gas_used: U64,
    /// Set when the call reverted while generating the list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccessListResponse {
    /// Whether list generation succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Number of distinct addresses in the list
    pub fn address_count(&self) -> usize {
        self.access_list.0.len()
    }

    /// Total number of storage keys over all addresses
    pub fn storage_key_count(&self) -> usize {
        self.access_list.0.iter().map(|item| item.storage_keys.len()).sum()
    }
}
