//! Integration tests for the API client
//!
//! Each test runs against an in-process `httpmock` server.
//!
//! # Test Coverage
//! - Bearer authentication and envelope decoding
//! - Retries on transient statuses and immediate failure on client errors
//! - Local validation before any request is sent
//! - Parallel simulate + trace + access list with partial failures
//! - Access list gas comparison, including the skip-on-error path

mod common;

use altitrace::{
    types::{BlockTag, SimulationStatus, TraceTransactionRequest, B256},
    utils::access_list_utils::Recommendation,
    AltitraceError, ClientError, GasUsage, SimulationRequestBuilder, ValidationError,
};
use common::*;
use httpmock::prelude::*;
use serde_json::json;

#[tokio::test]
async fn test_simulate_sends_bearer_token_and_decodes_envelope() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/simulate")
                .header("authorization", "Bearer secret")
                .body_contains("traceAssetChanges");
            then.status(200).json_body(ok(simulation("sim_ok", true, 21_000)));
        })
        .await;

    let request = SimulationRequestBuilder::new()
        .call(call_to(5))
        .account(ALICE)
        .block_tag(BlockTag::Latest)
        .build()
        .unwrap();
    let result = client(&server, 3).simulation().simulate(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(result.simulation_id, "sim_ok");
    assert_eq!(result.status, SimulationStatus::Success);
    assert_eq!(result.gas_used(), 21_000);
    assert_eq!(result.asset_deltas().values().next().map(|delta| delta.to_string()), Some("-1000".to_string()));
}

#[tokio::test]
async fn test_transient_status_is_retried_until_exhausted() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/trace/tx");
            then.status(503).body("upstream unavailable");
        })
        .await;

    let request = TraceTransactionRequest { transaction_hash: B256::ZERO, tracer_config: Default::default() };
    let error = client(&server, 3).trace().transaction(&request).await.unwrap_err();

    assert_eq!(mock.hits_async().await, 3);
    match error {
        AltitraceError::Client(ClientError::RetriesExhausted { attempts, last_error }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error.status(), Some(503));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_api_error_is_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate");
            then.status(400).json_body(json!({
                "success": false,
                "error": {
                    "code": "VALIDATION_ERROR",
                    "message": "Invalid block number",
                    "suggestion": "Use a mined block"
                }
            }));
        })
        .await;

    let request = SimulationRequestBuilder::new().call(call_to(5)).without_asset_tracing().build().unwrap();
    let error = client(&server, 3).simulation().simulate(&request).await.unwrap_err();

    assert_eq!(mock.hits_async().await, 1);
    match error {
        AltitraceError::Client(ClientError::Api { code, suggestion, .. }) => {
            assert_eq!(code, "VALIDATION_ERROR");
            assert_eq!(suggestion.as_deref(), Some("Use a mined block"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_batch_never_reaches_the_server() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate/batch");
            then.status(200).json_body(ok(json!([])));
        })
        .await;

    let error = client(&server, 1).simulation().simulate_batch(&[]).await.unwrap_err();

    assert_eq!(mock.hits_async().await, 0);
    assert!(matches!(
        error,
        AltitraceError::Validation(ValidationError::InvalidSize { min: 1, max: 10, actual: 0, .. })
    ));
}

#[tokio::test]
async fn test_simulate_with_trace_keeps_partial_results() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate");
            then.status(200).json_body(ok(simulation("sim_full", true, 46_000)));
        })
        .await;
    let trace = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/trace/call").body_contains("\"diffMode\":true");
            then.status(500).body("tracer crashed");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate/access-list");
            then.status(200).json_body(ok(json!({"accessList": [], "gasUsed": "0xb3b0"})));
        })
        .await;

    let result = client(&server, 1).simulate_with_trace(call_to(5), BlockTag::Latest).await.unwrap();

    trace.assert_async().await;
    assert!(!result.is_complete());
    assert!(result.simulation.is_success());
    assert!(result.trace.is_none());
    assert!(result.trace_error.as_deref().is_some_and(|error| error.contains("500")));
    assert!(result.access_list.is_some());
    assert!(result.access_list_error.is_none());
}

#[tokio::test]
async fn test_simulate_with_trace_requires_the_simulation() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate");
            then.status(422).json_body(json!({
                "success": false,
                "error": {"code": "SIMULATION_FAILED", "message": "Nonce too low"}
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/trace/call");
            then.status(200).json_body(ok(prestate_diff_trace()));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate/access-list");
            then.status(200).json_body(ok(json!({"accessList": [], "gasUsed": "0x5208"})));
        })
        .await;

    let error = client(&server, 1).simulate_with_trace(call_to(5), BlockTag::Latest).await.unwrap_err();
    assert!(matches!(error, AltitraceError::Client(ClientError::Api { ref code, .. }) if code == "SIMULATION_FAILED"));
}

#[tokio::test]
async fn test_compare_access_list_recommends_savings() {
    let server = MockServer::start_async().await;
    let baseline = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate").matches(|request| {
                !request.body.as_deref().is_some_and(|body| String::from_utf8_lossy(body).contains("accessList"))
            });
            then.status(200).json_body(ok(simulation("sim_base", true, 60_000)));
        })
        .await;
    let optimized = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate").body_contains("accessList");
            then.status(200).json_body(ok(simulation("sim_list", true, 52_000)));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate/access-list");
            then.status(200).json_body(ok(json!({
                "accessList": [{
                    "address": "0x0000000000000000000000000000000000000007",
                    "storageKeys": ["0x0000000000000000000000000000000000000000000000000000000000000003"]
                }],
                "gasUsed": "0xcb20"
            })));
        })
        .await;

    let report = client(&server, 1).compare_access_list(call_to(5), BlockTag::Latest).await.unwrap();

    baseline.assert_async().await;
    optimized.assert_async().await;
    let comparison = report.comparison.unwrap();
    assert_eq!(comparison.gas_without, 60_000);
    assert_eq!(comparison.gas_with, 52_000);
    assert_eq!(comparison.gas_difference, 8_000);
    assert_eq!(comparison.recommendation, Recommendation::Recommended);
    assert!(comparison.significant);
    assert_eq!((comparison.address_count, comparison.storage_key_count), (1, 1));
    assert_eq!(comparison.list_cost, 2_400 + 1_900);
}

#[tokio::test]
async fn test_compare_access_list_skips_on_generation_error() {
    let server = MockServer::start_async().await;
    let simulate = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate");
            then.status(200).json_body(ok(simulation("sim_base", false, 30_000)));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/simulate/access-list");
            then.status(200).json_body(ok(json!({
                "accessList": [],
                "gasUsed": "0x0",
                "error": "execution reverted"
            })));
        })
        .await;

    let report = client(&server, 1).compare_access_list(call_to(5), BlockTag::Latest).await.unwrap();

    assert_eq!(simulate.hits_async().await, 1);
    assert!(report.optimized.is_none());
    assert!(report.comparison.is_none());
    assert_eq!(report.error.as_deref(), Some("execution reverted"));
    assert_eq!(report.baseline.revert_reasons(), vec!["Insufficient balance".to_string()]);
}
