//! Shared fixtures for HTTP-level tests.

#![allow(dead_code)]

use firebolt_client::{ConnectParams, Connection, connect};
use firebolt_client::Auth;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_BODY: &str =
    r#"{"access_token": "mock-token", "expires_in": 3600, "token_type": "Bearer"}"#;

/// A `JSON_Compact` body with the given columns and rows.
pub fn query_body(meta: &[(&str, &str)], data: serde_json::Value) -> serde_json::Value {
    let meta: Vec<serde_json::Value> = meta
        .iter()
        .map(|(name, type_str)| json!({"name": name, "type": type_str}))
        .collect();
    let rows = data.as_array().map_or(0, Vec::len);
    json!({
        "meta": meta,
        "data": data,
        "rows": rows,
        "statistics": {
            "elapsed": 0.01,
            "rows_read": rows,
            "bytes_read": 1,
            "time_before_execution": 0.001,
            "time_to_execute": 0.009
        }
    })
}

/// Body of a one-column `SELECT` returning a single int.
pub fn select_one_body() -> serde_json::Value {
    query_body(&[("?column?", "Int32")], json!([[1]]))
}

/// Mount the token endpoint, expecting any number of acquisitions.
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(TOKEN_BODY, "application/json"))
        .mount(server)
        .await;
}

/// Mount V2 system-engine discovery pointing back at the same server.
pub async fn mount_engine_discovery(server: &MockServer, account: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/web/v3/account/{account}/engineUrl")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"engineUrl": server.uri()})),
        )
        .mount(server)
        .await;
}

/// Connection parameters for a V2 bootstrap against the mock server.
///
/// `tag` keeps credentials unique per test so the process-wide connection
/// cache cannot leak state between tests.
pub fn v2_params(server: &MockServer, tag: &str) -> ConnectParams {
    ConnectParams::new(
        Auth::client_credentials(format!("id-{tag}"), "secret").with_token_cache(false),
    )
    .with_account_name(tag)
    .with_api_endpoint(server.uri())
}

/// A connection to a Core deployment backed by the mock server.
pub async fn core_connection(server: &MockServer) -> Connection {
    connect(ConnectParams::new(Auth::core(server.uri())))
        .await
        .expect("core connection")
}
