//! Revert reason decoding and normalisation
//!
//! Handles:
//! - `Error(string)` revert payloads (selector `0x08c379a0`)
//! - `Panic(uint256)` payloads (selector `0x4e487b71`) with readable codes
//! - Node error strings such as `execution reverted: ...`

use alloy::dyn_abi::{DynSolType, DynSolValue};

const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Describes a Solidity panic code
pub fn panic_reason(code: u64) -> String {
    let reason = match code {
        0x01 => "Assertion failed",
        0x11 => "Arithmetic overflow",
        0x12 => "Division by zero",
        0x21 => "Invalid array access",
        0x22 => "Array access out of bounds",
        0x31 => "Invalid enum value",
        0x32 => "Invalid storage access",
        0x41 => "Zero initialization",
        0x51 => "Invalid calldata access",
        code => return format!("Panic: Unknown error code (0x{code:x})"),
    };
    format!("Panic: {reason}")
}

/// Decodes revert output returned by a failed call
///
/// # Arguments
/// * `output` - Raw return data of the failed call
///
/// # Returns
/// * `Some(String)` - The revert message or panic description
/// * `None` - If the payload is neither `Error(string)` nor `Panic(uint256)`
pub fn parse_custom_error(output: &[u8]) -> Option<String> {
    let (selector, payload) = output.split_first_chunk::<4>()?;
    match *selector {
        ERROR_SELECTOR => match DynSolType::String.abi_decode(payload) {
            Ok(DynSolValue::String(reason)) => Some(reason),
            _ => None,
        },
        PANIC_SELECTOR => match DynSolType::Uint(256).abi_decode(payload) {
            Ok(DynSolValue::Uint(code, _)) => Some(panic_reason(code.saturating_to())),
            _ => None,
        },
        _ => None,
    }
}

/// Extracts a readable revert reason from a node error message
///
/// Strips the `execution reverted: ` and `revert ` prefixes and collapses
/// out-of-gas and insufficient-funds errors into short labels.
pub fn extract_revert_reason(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    if lower.contains("out of gas") {
        return "Out of gas".to_string();
    }
    if lower.contains("insufficient funds") {
        return "Insufficient funds".to_string();
    }

    let trimmed = message.trim();
    let reason = trimmed
        .strip_prefix("execution reverted: ")
        .or_else(|| trimmed.strip_prefix("revert "))
        .unwrap_or(trimmed);
    reason.trim().to_string()
}

/// Best-effort revert reason from an explicit reason, raw output, or error text
pub fn resolve_revert_reason(
    revert_reason: Option<&str>,
    output: &[u8],
    error: Option<&str>,
) -> Option<String> {
    revert_reason
        .filter(|reason| !reason.is_empty())
        .map(str::to_string)
        .or_else(|| parse_custom_error(output))
        .or_else(|| error.map(extract_revert_reason))
}
