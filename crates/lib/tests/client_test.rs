//! # API Client Tests

use anyhow::Result;
use gapi_helper::{Access, ApiClient, GapiError, RetryPolicy, StaticTokenProvider, NO_QUERY};
use httpmock::{Method, MockServer};
use serde_json::{json, Value};
use std::sync::Arc;

fn client(max_failures: u32) -> ApiClient {
    ApiClient::new(
        Arc::new(StaticTokenProvider::new("test-token")),
        RetryPolicy::immediate(max_failures),
    )
}

#[tokio::test]
async fn test_get_json_sends_bearer_token() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/files")
            .query_param("fields", "files(id)")
            .header("authorization", "Bearer test-token");
        then.status(200).json_body(json!({"files": []}));
    });

    let body: Value = client(0)
        .get_json(&server.url("/files"), &[("fields", "files(id)")])
        .await?;

    mock.assert();
    assert_eq!(body, json!({"files": []}));
    Ok(())
}

#[tokio::test]
async fn test_send_json_posts_body() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/batch")
            .json_body(json!({"requests": [{"clearBasicFilter": {"sheetId": 7}}]}));
        then.status(200).json_body(json!({"replies": [{}]}));
    });

    let reply: Value = client(0)
        .send_json(
            Access::Write,
            reqwest::Method::POST,
            &server.url("/batch"),
            NO_QUERY,
            &json!({"requests": [{"clearBasicFilter": {"sheetId": 7}}]}),
        )
        .await?;

    mock.assert();
    assert_eq!(reply["replies"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_permission_errors_are_not_retried() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(Method::DELETE).path("/files/abc");
        then.status(403).json_body(json!({
            "error": {"code": 403, "message": "Insufficient permissions for this file"}
        }));
    });

    let err = client(5).delete(&server.url("/files/abc")).await.unwrap_err();

    mock.assert_hits(1);
    match err {
        GapiError::RemoteWrite { status, message } => {
            assert_eq!(status, Some(403));
            assert_eq!(message, "Insufficient permissions for this file");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_server_errors_are_retried_until_budget_is_spent() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(Method::GET).path("/flaky");
        then.status(503).body("Service Unavailable");
    });

    let result: Result<Value, GapiError> =
        client(2).get_json(&server.url("/flaky"), NO_QUERY).await;

    mock.assert_hits(3);
    let err = result.unwrap_err();
    assert!(matches!(err, GapiError::RemoteRead { status: Some(503), .. }));
    assert!(err.to_string().contains("Service Unavailable"));
    Ok(())
}
