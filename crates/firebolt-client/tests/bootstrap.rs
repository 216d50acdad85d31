//! Connection bootstrap scenarios against a mock service.

mod common;

use common::{core_connection, mount_engine_discovery, mount_token, query_body, select_one_body, v2_params};
use firebolt_client::{Auth, ConnectParams, Error, Value, connect};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_core_connection_executes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(query_param("output_format", "JSON_Compact"))
        .and(query_param("database", "firebolt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(select_one_body()))
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    assert_eq!(connection.database().as_deref(), Some("firebolt"));

    let mut cursor = connection.cursor().expect("cursor");
    let count = cursor.execute("SELECT 1", None).await.expect("execute");
    assert_eq!(count, 1);
    assert_eq!(
        cursor.fetchall().await.expect("fetchall"),
        vec![vec![Value::Int(1)]]
    );
    connection.close().await;
}

#[tokio::test]
async fn test_core_rejects_account_parameters() {
    let error = connect(
        ConnectParams::new(Auth::core("http://localhost:3473")).with_account_name("acc"),
    )
    .await
    .expect_err("must reject");
    assert!(matches!(error, Error::Configuration(m) if m.contains("account_name")));

    let error = connect(
        ConnectParams::new(Auth::core("http://localhost:3473")).with_engine_name("eng"),
    )
    .await
    .expect_err("must reject");
    assert!(matches!(error, Error::Configuration(m) if m.contains("engine_name")));
}

#[tokio::test]
async fn test_v2_requires_account_name() {
    let error = connect(ConnectParams::new(
        Auth::client_credentials("i", "s").with_token_cache(false),
    ))
    .await
    .expect_err("must reject");
    assert!(matches!(error, Error::Configuration(m) if m.contains("account_name")));
}

#[tokio::test]
async fn test_v2_account_not_found() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/web/v3/account/ghost/engineUrl"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let error = connect(v2_params(&server, "ghost")).await.expect_err("404");
    assert!(matches!(error, Error::AccountNotFound(name) if name == "ghost"));
}

#[tokio::test]
async fn test_v2_discovery_failure_is_interface_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/web/v3/account/flaky/engineUrl"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let error = connect(v2_params(&server, "flaky")).await.expect_err("503");
    assert!(matches!(error, Error::Interface(m) if m.contains("system engine endpoint")));
}

#[tokio::test]
async fn test_v2_system_engine_connection() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_engine_discovery(&server, "sys").await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(query_param("database", "db1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(select_one_body()))
        .mount(&server)
        .await;

    let connection = connect(v2_params(&server, "sys").with_database("db1"))
        .await
        .expect("connect");
    let mut cursor = connection.cursor().expect("cursor");
    assert_eq!(cursor.execute("SELECT 1", None).await.expect("execute"), 1);
    connection.close().await;
}

#[tokio::test]
async fn test_v2_user_engine_resolution() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_engine_discovery(&server, "eng").await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("information_schema.engines"))
        .and(body_string_contains("my_engine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_body(
            &[("url", "String"), ("attached_to", "String"), ("status", "String")],
            json!([[server.uri(), "db1", "Running"]]),
        )))
        .mount(&server)
        .await;

    let connection = connect(v2_params(&server, "eng").with_engine_name("my_engine"))
        .await
        .expect("connect");
    // Database pinned from the engine's attachment.
    assert_eq!(connection.database().as_deref(), Some("db1"));
    connection.close().await;
}

#[tokio::test]
async fn test_v2_engine_not_running() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_engine_discovery(&server, "stopped").await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("information_schema.engines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_body(
            &[("url", "String"), ("attached_to", "String"), ("status", "String")],
            json!([[server.uri(), "db1", "Stopped"]]),
        )))
        .mount(&server)
        .await;

    let error = connect(v2_params(&server, "stopped").with_engine_name("my_engine"))
        .await
        .expect_err("not running");
    assert!(matches!(error, Error::EngineNotRunning(name) if name == "my_engine"));
}

#[tokio::test]
async fn test_v2_engine_not_found() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_engine_discovery(&server, "missing").await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("information_schema.engines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_body(
            &[("url", "String"), ("attached_to", "String"), ("status", "String")],
            json!([]),
        )))
        .mount(&server)
        .await;

    let error = connect(v2_params(&server, "missing").with_engine_name("my_engine"))
        .await
        .expect_err("no row");
    assert!(matches!(error, Error::EngineNotFound(name) if name.contains("my_engine")));
}

#[tokio::test]
async fn test_v2_engine_database_mismatch() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_engine_discovery(&server, "mismatch").await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("information_schema.engines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_body(
            &[("url", "String"), ("attached_to", "String"), ("status", "String")],
            json!([[server.uri(), "db1", "Running"]]),
        )))
        .mount(&server)
        .await;

    let error = connect(
        v2_params(&server, "mismatch")
            .with_engine_name("my_engine")
            .with_database("other"),
    )
    .await
    .expect_err("mismatch");
    assert!(matches!(error, Error::Interface(m) if m.contains("attached to db1")));
}

#[tokio::test]
async fn test_close_cascades_to_cursors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(select_one_body()))
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    cursor.execute("SELECT 1", None).await.expect("execute");

    connection.close().await;
    assert!(connection.closed());
    assert!(cursor.closed());
    assert!(matches!(
        cursor.fetchone().await,
        Err(Error::CursorClosed("fetchone"))
    ));
    assert!(matches!(
        connection.cursor(),
        Err(Error::ConnectionClosed("create cursor"))
    ));
    // Close is idempotent.
    connection.close().await;
}
