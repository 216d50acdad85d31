//! Streaming (JSON-Lines) execution scenarios.

mod common;

use common::core_connection;
use firebolt_client::{Error, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn json_lines_body(rows: usize, batch: usize) -> String {
    let mut body = String::new();
    body.push_str(
        r#"{"message_type": "START", "result_columns": [{"name": "x", "type": "String"}], "query_id": "q1", "query_label": "", "request_id": "r1"}"#,
    );
    body.push('\n');
    let mut emitted = 0;
    while emitted < rows {
        let n = batch.min(rows - emitted);
        let data: Vec<String> = (0..n).map(|_| r#"["x"]"#.to_owned()).collect();
        body.push_str(&format!(
            r#"{{"message_type": "DATA", "data": [{}]}}"#,
            data.join(", ")
        ));
        body.push('\n');
        emitted += n;
    }
    body.push_str(&format!(
        r#"{{"message_type": "FINISH_SUCCESSFULLY", "statistics": {{"elapsed": 0.5, "rows_read": {rows}, "bytes_read": {rows}, "time_before_execution": 0.0, "time_to_execute": 0.5}}}}"#,
    ));
    body.push('\n');
    body
}

#[tokio::test]
async fn test_streaming_yields_all_rows_and_final_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(query_param("output_format", "JSONLines_Compact"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(json_lines_body(10_000, 500), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    cursor.execute_stream("SELECT 'x' FROM big", None).await.expect("execute");

    // Row count is unknown until the stream is drained.
    assert_eq!(cursor.rowcount().await.expect("rowcount"), -1);

    let mut count = 0usize;
    while let Some(row) = cursor.fetchone().await.expect("fetch") {
        assert_eq!(row, vec![Value::Str("x".to_owned())]);
        count += 1;
    }
    assert_eq!(count, 10_000);
    assert_eq!(cursor.rowcount().await.expect("rowcount"), 10_000);
    let statistics = cursor.statistics().await.expect("stats").expect("present");
    assert_eq!(statistics.rows_read, 10_000);
    connection.close().await;
}

#[tokio::test]
async fn test_streaming_fetchmany_respects_arraysize() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(json_lines_body(10, 3), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    cursor.set_arraysize(4);
    cursor.execute_stream("SELECT 'x' FROM t", None).await.expect("execute");
    assert_eq!(cursor.fetchmany(None).await.expect("fetchmany").len(), 4);
    assert_eq!(cursor.fetchmany(Some(100)).await.expect("fetchmany").len(), 6);
    assert!(cursor.fetchmany(None).await.expect("fetchmany").is_empty());
    connection.close().await;
}

#[tokio::test]
async fn test_streaming_error_record_poisons_cursor() {
    let server = MockServer::start().await;
    let body = concat!(
        r#"{"message_type": "START", "result_columns": [{"name": "x", "type": "Int32"}], "query_id": "q1", "query_label": "", "request_id": "r1"}"#,
        "\n",
        r#"{"message_type": "DATA", "data": [[1]]}"#,
        "\n",
        r#"{"message_type": "FINISH_WITH_ERRORS", "errors": [{"severity": "ERROR", "name": "DivisionByZero", "code": "FB010", "description": "division by zero"}], "statistics": {"elapsed": 0.1, "rows_read": 1, "bytes_read": 1, "time_before_execution": 0.0, "time_to_execute": 0.1}}"#,
        "\n",
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    cursor.execute_stream("SELECT 1/0 FROM t", None).await.expect("execute");

    assert_eq!(
        cursor.fetchone().await.expect("first row"),
        Some(vec![Value::Int(1)])
    );
    let error = cursor.fetchone().await.expect_err("structured");
    let Error::Structured(structured) = error else {
        panic!("expected structured error, got {error:?}");
    };
    assert!(structured.to_string().contains("division by zero"));

    // The cursor is poisoned: further fetches report no query ran.
    assert!(matches!(
        cursor.fetchone().await,
        Err(Error::QueryNotRun("fetchone"))
    ));
    connection.close().await;
}

#[tokio::test]
async fn test_streaming_truncated_stream() {
    let server = MockServer::start().await;
    let body = concat!(
        r#"{"message_type": "START", "result_columns": [{"name": "x", "type": "Int32"}], "query_id": "q1", "query_label": "", "request_id": "r1"}"#,
        "\n",
        r#"{"message_type": "DATA", "data": [[1]]}"#,
        "\n",
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    cursor.execute_stream("SELECT 1", None).await.expect("execute");
    assert!(cursor.fetchone().await.expect("row").is_some());
    let error = cursor.fetchone().await.expect_err("truncated");
    assert!(
        matches!(&error, Error::Operational(m) if m.contains("Unexpected end of response stream"))
    );
    connection.close().await;
}

#[tokio::test]
async fn test_streaming_multi_statement_nextset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(json_lines_body(2, 2), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let connection = core_connection(&server).await;
    let mut cursor = connection.cursor().expect("cursor");
    cursor
        .execute_stream("SELECT 'x' FROM a; SELECT 'x' FROM b", None)
        .await
        .expect("execute");

    assert_eq!(cursor.fetchall().await.expect("first set").len(), 2);
    assert!(cursor.nextset().await.expect("nextset"));
    assert_eq!(cursor.fetchall().await.expect("second set").len(), 2);
    assert!(!cursor.nextset().await.expect("no third set"));
    connection.close().await;
}
