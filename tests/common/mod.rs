//! Shared fixtures for the integration tests
//!
//! Every test spins up its own `httpmock` server and points an
//! [`AltitraceClient`] at `{server}/v1` with fast retries.

#![allow(dead_code)]

use alloy::primitives::{Address, U256};
use altitrace::{types::TransactionCall, AltitraceClient, ClientConfig, RetryConfig, TransactionCallBuilder};
use httpmock::MockServer;
use serde_json::{json, Value};

pub const ALICE: Address = Address::with_last_byte(0xa1);
pub const BOB: Address = Address::with_last_byte(0xb0);
pub const STORAGE_HOLDER: Address = Address::with_last_byte(0x44);

/// Client for `server` with millisecond retry delays
pub fn client(server: &MockServer, max_attempts: u32) -> AltitraceClient {
    let retry = RetryConfig {
        max_attempts,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        ..Default::default()
    };
    let config = ClientConfig::new(&server.url("/v1")).unwrap().with_api_key("secret").with_retry(retry);
    AltitraceClient::new(config).unwrap()
}

/// Call from [`ALICE`] to the address ending in `target`
///
/// Use targets between 0x05 and 0x09: their hex form has no letters, so it
/// matches request bodies regardless of checksum casing, and it never
/// collides with the slot words of [`prestate_diff_trace`].
pub fn call_to(target: u8) -> TransactionCall {
    call_from(ALICE, target)
}

/// Call from `from` to the address ending in `target`
pub fn call_from(from: Address, target: u8) -> TransactionCall {
    TransactionCallBuilder::new()
        .from(from)
        .to(Address::with_last_byte(target))
        .value(U256::from(1_000u64))
        .build()
}

/// Lowercase hex of the address ending in `target`, without `0x`
pub fn address_hex(target: u8) -> String {
    format!("{:040x}", target)
}

/// Envelope around `data`
pub fn ok(data: Value) -> Value {
    json!({
        "success": true,
        "data": data,
        "metadata": {"requestId": "req_test", "timestamp": "2025-01-01T00:00:00Z", "executionTime": 3}
    })
}

/// Simulation result with one call
pub fn simulation(id: &str, success: bool, gas_used: u64) -> Value {
    let mut call = json!({
        "callIndex": 0,
        "status": if success { "success" } else { "reverted" },
        "returnData": "0x",
        "gasUsed": format!("0x{gas_used:x}"),
        "logs": []
    });
    if !success {
        call["error"] = json!({
            "reason": "execution reverted: Insufficient balance",
            "errorType": "execution-reverted"
        });
    }
    json!({
        "simulationId": id,
        "blockNumber": "0x1312d00",
        "status": if success { "success" } else { "reverted" },
        "calls": [call],
        "gasUsed": format!("0x{gas_used:x}"),
        "blockGasUsed": format!("0x{gas_used:x}"),
        "assetChanges": [{
            "token": {"address": "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee", "decimals": 18, "symbol": "ETH"},
            "value": {"pre": "0x2710", "post": "0x2328", "diff": "-1000"}
        }]
    })
}

/// Trace response whose prestate diff writes slot 1 = 0x2a on [`STORAGE_HOLDER`]
pub fn prestate_diff_trace() -> Value {
    json!({
        "prestateTracer": {
            "pre": {
                ALICE.to_string(): {"balance": "0x2710", "nonce": 0},
                STORAGE_HOLDER.to_string(): {"balance": "0x0", "storage": {}}
            },
            "post": {
                ALICE.to_string(): {"balance": "0x2328", "nonce": 1},
                STORAGE_HOLDER.to_string(): {"storage": {
                    "0x0000000000000000000000000000000000000000000000000000000000000001":
                        "0x000000000000000000000000000000000000000000000000000000000000002a"
                }}
            }
        }
    })
}

/// Hex of the slot value written by [`prestate_diff_trace`], without `0x`
pub const CARRIED_SLOT_VALUE: &str = "000000000000000000000000000000000000000000000000000000000000002a";

/// Trace response whose prestate diff clears slot 2 of [`STORAGE_HOLDER`]
///
/// The tracer drops zero values from `post`, so the slot only shows up in `pre`.
pub fn cleared_slot_trace() -> Value {
    json!({
        "prestateTracer": {
            "pre": {
                STORAGE_HOLDER.to_string(): {"storage": {
                    "0x0000000000000000000000000000000000000000000000000000000000000002":
                        "0x0000000000000000000000000000000000000000000000000000000000000007"
                }}
            },
            "post": {
                STORAGE_HOLDER.to_string(): {}
            }
        }
    })
}

/// `stateDiff` entry that zeroes the slot cleared by [`cleared_slot_trace`]
pub const CLEARED_SLOT_PATCH: &str = "\"0x0000000000000000000000000000000000000000000000000000000000000002\":\"0x0000000000000000000000000000000000000000000000000000000000000000\"";
