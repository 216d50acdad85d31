//! Server-side async query lifecycle.

mod common;

use common::{core_connection, query_body, select_one_body};
use firebolt_client::Error;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(query_param("async", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "async-token-1",
            "message": "the query was accepted for async processing",
            "monitorSql": "CALL fb_GetAsyncStatus('async-token-1');"
        })))
        .mount(server)
        .await;
}

fn history_body(status: &str) -> serde_json::Value {
    query_body(
        &[("status", "String"), ("query_id", "String")],
        json!([[status, "query-7"]]),
    )
}

#[tokio::test]
async fn test_execute_async_returns_token() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    let token = cursor
        .execute_async("INSERT INTO t SELECT checksum(*) FROM big", None)
        .await
        .expect("submit");
    assert_eq!(token, "async-token-1");
    assert_eq!(cursor.async_query_token().expect("token"), "async-token-1");

    // Row-producing methods are not allowed on an async submission.
    assert!(matches!(
        cursor.fetchone().await,
        Err(Error::MethodNotAllowedInAsync("fetchone"))
    ));
    assert!(matches!(
        cursor.fetchall().await,
        Err(Error::MethodNotAllowedInAsync("fetchall"))
    ));
    connection.close().await;
}

#[tokio::test]
async fn test_async_status_polling() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("engine_query_history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body("RUNNING")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("engine_query_history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body("ENDED_SUCCESSFULLY")))
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    let token = cursor
        .execute_async("INSERT INTO t SELECT 1", None)
        .await
        .expect("submit");

    assert!(connection.is_async_query_running(&token).await.expect("poll"));
    assert_eq!(
        connection.is_async_query_successful(&token).await.expect("poll"),
        Some(true)
    );
    connection.close().await;
}

#[tokio::test]
async fn test_async_cancel() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("engine_query_history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body("RUNNING")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("CANCEL QUERY WHERE query_id='query-7'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(select_one_body()))
        .expect(1)
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    let token = cursor
        .execute_async("INSERT INTO t SELECT 1", None)
        .await
        .expect("submit");
    connection.cancel_async_query(&token).await.expect("cancel");
    connection.close().await;
}

#[tokio::test]
async fn test_async_unknown_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("engine_query_history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_body(
            &[("status", "String"), ("query_id", "String")],
            json!([]),
        )))
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let error = connection
        .get_async_query_info("no-such-token")
        .await
        .expect_err("unknown token");
    assert!(matches!(error, Error::Operational(m) if m.contains("no-such-token")));
    connection.close().await;
}

#[tokio::test]
async fn test_async_token_absent_on_sync_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(select_one_body()))
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    cursor.execute("SELECT 1", None).await.expect("execute");
    assert!(cursor.async_query_token().is_err());
    connection.close().await;
}
