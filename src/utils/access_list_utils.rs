//! EIP-2930 access list gas comparison
//!
//! Compares the gas of a call executed with and without a generated access
//! list and turns the difference into a recommendation.

use revm::interpreter::gas::{ACCESS_LIST_ADDRESS, ACCESS_LIST_STORAGE_KEY};
use serde::Serialize;

use crate::types::AccessList;

/// Savings above this share of the baseline are flagged as significant
pub const SIGNIFICANT_SAVINGS_PERCENT: f64 = 5.0;

/// Whether to attach the access list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    /// The list saves gas
    Recommended,
    /// The list costs more than it saves
    NotRecommended,
    /// No difference
    Neutral,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Recommendation::Recommended => "recommended",
            Recommendation::NotRecommended => "not recommended",
            Recommendation::Neutral => "neutral",
        };
        f.write_str(label)
    }
}

/// Result of an access list gas comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessListComparison {
    /// Gas of the call without an access list
    pub gas_without: u64,
    /// Gas of the call with the access list
    pub gas_with: u64,
    /// `gas_without - gas_with`; positive means the list saves gas
    pub gas_difference: i128,
    /// Savings relative to `gas_without`, negative when the list costs more
    pub savings_percentage: f64,
    pub recommendation: Recommendation,
    /// Savings exceed [`SIGNIFICANT_SAVINGS_PERCENT`]
    pub significant: bool,
    /// Intrinsic gas charged for declaring the list
    pub list_cost: u64,
    pub address_count: usize,
    pub storage_key_count: usize,
}

/// Intrinsic gas charged for an access list
///
/// 2400 per address plus 1900 per storage key.
pub fn access_list_cost(list: &AccessList) -> u64 {
    let count = |n: usize| u64::try_from(n).unwrap_or(u64::MAX);
    let addresses = count(list.0.len());
    let keys = list.0.iter().fold(0u64, |sum, item| sum.saturating_add(count(item.storage_keys.len())));
    addresses.saturating_mul(ACCESS_LIST_ADDRESS).saturating_add(keys.saturating_mul(ACCESS_LIST_STORAGE_KEY))
}

/// Compares gas with and without an access list
///
/// # Arguments
/// * `gas_without` - Gas used by the baseline simulation
/// * `gas_with` - Gas used with the access list applied
/// * `list` - The access list that was applied
pub fn compare_gas_usage(gas_without: u64, gas_with: u64, list: &AccessList) -> AccessListComparison {
    let gas_difference = i128::from(gas_without) - i128::from(gas_with);
    let savings_percentage = if gas_without == 0 {
        0.0
    } else {
        gas_difference as f64 * 100.0 / gas_without as f64
    };
    let recommendation = match gas_difference {
        d if d > 0 => Recommendation::Recommended,
        d if d < 0 => Recommendation::NotRecommended,
        _ => Recommendation::Neutral,
    };

    AccessListComparison {
        gas_without,
        gas_with,
        gas_difference,
        savings_percentage,
        recommendation,
        significant: savings_percentage > SIGNIFICANT_SAVINGS_PERCENT,
        list_cost: access_list_cost(list),
        address_count: list.0.len(),
        storage_key_count: list.0.iter().map(|item| item.storage_keys.len()).sum(),
    }
}
