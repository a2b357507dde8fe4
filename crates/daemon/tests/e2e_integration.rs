//! End-to-end integration tests for Filedock.
//!
//! These tests drive the HTTP router in-process and verify complete flows:
//! - Listing the sandbox root
//! - Single and batch copy/move
//! - Hash verification
//! - Error status codes and bodies

use std::fs;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use daemon::files::SandboxRoot;
use daemon::router::{router, AppState};
use protocol::{
    BatchRequest, BatchResponse, ErrorBody, ErrorCode, FileMetadata, TransferRequest,
    TransferStatus,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const HELLO_MD5: &str = "65a8e27d8879283831b664bd8b7f0ad4";
const HELLO_SHA256: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

/// Create a router over a fresh sandbox holding `hello.txt`.
fn create_test_app() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("hello.txt"), "Hello, World!").unwrap();
    let sandbox = SandboxRoot::new(temp_dir.path()).unwrap();
    let app = router(AppState::new(sandbox, 4, 4096));
    (app, temp_dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn error_body(body: Value) -> ErrorBody {
    serde_json::from_value(body).unwrap()
}

// =============================================================================
// Listing Tests
// =============================================================================

#[tokio::test]
async fn test_list_reports_visible_files() {
    let (app, temp_dir) = create_test_app();
    fs::remove_file(temp_dir.path().join("hello.txt")).unwrap();
    fs::write(temp_dir.path().join("a.txt"), vec![b'x'; 2048]).unwrap();
    fs::write(temp_dir.path().join(".secret"), "hidden").unwrap();
    fs::create_dir_all(temp_dir.path().join("docs")).unwrap();

    let (status, body) = get(&app, "/list").await;

    assert_eq!(status, StatusCode::OK);
    let files: Vec<FileMetadata> = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(files, vec![FileMetadata::new("a.txt", 2.0, "txt")]);
    assert_eq!(
        body,
        json!([{"name": "a.txt", "size": 2.0, "unit": "KB", "format": "txt"}])
    );
}

// =============================================================================
// Single Transfer Tests
// =============================================================================

#[tokio::test]
async fn test_copy_file() {
    let (app, temp_dir) = create_test_app();

    let (status, body) = post_json(
        &app,
        "/copy",
        json!({"source": "hello.txt", "destination": "backup/2024/hello.txt"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "File copied successfully"}));
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("backup/2024/hello.txt")).unwrap(),
        "Hello, World!"
    );
    assert!(temp_dir.path().join("hello.txt").exists());
}

#[tokio::test]
async fn test_copy_invalid_directory_name() {
    let (app, temp_dir) = create_test_app();

    let (status, body) = post_json(
        &app,
        "/copy",
        json!({"source": "hello.txt", "destination": "my.docs/hello.txt"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err = error_body(body);
    assert_eq!(err.error, "Invalid directory name");
    assert_eq!(err.code, ErrorCode::InvalidDestination);
    assert!(!temp_dir.path().join("my.docs").exists());
    assert!(temp_dir.path().join("hello.txt").exists());
}

#[tokio::test]
async fn test_copy_missing_fields() {
    let (app, _temp_dir) = create_test_app();

    let (status, body) = post_json(&app, "/copy", json!({"source": "hello.txt"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_body(body).error,
        "Source and destination are required"
    );
}

#[tokio::test]
async fn test_copy_malformed_body() {
    let (app, _temp_dir) = create_test_app();

    let request = Request::post("/copy")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_body(body).code, ErrorCode::InvalidRequest);

    let (status, _) = post_json(&app, "/copy", json!({"source": 1, "destination": "a.txt"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_copy_source_not_found() {
    let (app, _temp_dir) = create_test_app();

    let (status, body) = post_json(
        &app,
        "/copy",
        json!({"source": "ghost.txt", "destination": "ghost-copy.txt"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let err = error_body(body);
    assert_eq!(err.error, "Failed to copy file");
    assert_eq!(err.code, ErrorCode::NotFound);
    assert!(err.details.unwrap().contains("ghost.txt"));
}

#[tokio::test]
async fn test_copy_rejects_traversal() {
    let (app, _temp_dir) = create_test_app();

    let (status, body) = post_json(
        &app,
        "/copy",
        json!({"source": "hello.txt", "destination": "../escaped.txt"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_body(body).code, ErrorCode::OutsideSandbox);

    let (status, body) = post_json(
        &app,
        "/copy",
        json!({"source": "/etc/hostname", "destination": "stolen.txt"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_body(body).code, ErrorCode::OutsideSandbox);
}

#[tokio::test]
async fn test_move_file_then_repeat() {
    let (app, temp_dir) = create_test_app();
    let request = json!({"source": "hello.txt", "destination": "archive/hello.txt"});

    let (status, body) = post_json(&app, "/move", request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "File moved successfully"}));
    assert!(!temp_dir.path().join("hello.txt").exists());
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("archive/hello.txt")).unwrap(),
        "Hello, World!"
    );

    let (status, body) = post_json(&app, "/move", request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_body(body).error, "Failed to move file");
}

// =============================================================================
// Batch Tests
// =============================================================================

#[tokio::test]
async fn test_batch_copy_isolates_failures() {
    let (app, temp_dir) = create_test_app();

    let request = BatchRequest {
        operations: vec![
            TransferRequest::new("hello.txt", "one/hello.txt"),
            TransferRequest::new("hello.txt", "bad dir/hello.txt"),
            TransferRequest::new("hello.txt", "two/hello.txt"),
        ],
    };
    let (status, body) =
        post_json(&app, "/batch-copy", serde_json::to_value(&request).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let response: BatchResponse = serde_json::from_value(body.clone()).unwrap();
    let statuses: Vec<TransferStatus> = response.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            TransferStatus::Success,
            TransferStatus::Failed,
            TransferStatus::Success
        ]
    );
    assert_eq!(body["results"][1]["status"], "failed");
    assert_eq!(body["results"][1]["destination"], "bad dir/hello.txt");
    assert!(body["results"][0].get("error").is_none());
    assert!(temp_dir.path().join("one/hello.txt").exists());
    assert!(temp_dir.path().join("two/hello.txt").exists());
}

#[tokio::test]
async fn test_batch_move() {
    let (app, temp_dir) = create_test_app();
    fs::write(temp_dir.path().join("b.txt"), "bee").unwrap();

    let (status, body) = post_json(
        &app,
        "/batch-move",
        json!({"operations": [
            {"source": "hello.txt", "destination": "moved/hello.txt"},
            {"source": "b.txt", "destination": "moved/b.txt"},
            {"source": "missing.txt", "destination": "moved/missing.txt"},
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["status"], "success");
    assert_eq!(body["results"][1]["status"], "success");
    assert_eq!(body["results"][2]["status"], "failed");
    assert!(!temp_dir.path().join("hello.txt").exists());
    assert!(!temp_dir.path().join("b.txt").exists());
    assert!(temp_dir.path().join("moved/b.txt").exists());
}

#[tokio::test]
async fn test_batch_requires_array() {
    let (app, _temp_dir) = create_test_app();

    for body in [
        json!({"operations": "hello.txt"}),
        json!({}),
        json!({"operations": ["hello.txt"]}),
    ] {
        let (status, response) = post_json(&app, "/batch-copy", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_body(response).error, "Operations must be an array");
    }
}

#[tokio::test]
async fn test_batch_item_missing_field_fails_alone() {
    let (app, _temp_dir) = create_test_app();

    let (status, body) = post_json(
        &app,
        "/batch-copy",
        json!({"operations": [
            {"source": "hello.txt"},
            {"source": "hello.txt", "destination": "ok/hello.txt"},
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["status"], "failed");
    assert_eq!(body["results"][1]["status"], "success");
}

#[tokio::test]
async fn test_batch_item_with_non_string_field_fails_alone() {
    let (app, temp_dir) = create_test_app();

    let (status, body) = post_json(
        &app,
        "/batch-copy",
        json!({"operations": [
            {"source": 1, "destination": "b/x.txt"},
            {"source": "hello.txt", "destination": "ok/hello.txt"},
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: BatchResponse = serde_json::from_value(body).unwrap();
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].status, TransferStatus::Failed);
    assert_eq!(response.results[0].source, "1");
    assert_eq!(response.results[0].destination, "b/x.txt");
    assert!(response.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("expected a string"));
    assert_eq!(response.results[1].status, TransferStatus::Success);
    assert!(!temp_dir.path().join("b").exists());
    assert!(temp_dir.path().join("ok/hello.txt").exists());
}

#[tokio::test]
async fn test_batch_empty() {
    let (app, _temp_dir) = create_test_app();

    let (status, body) = post_json(&app, "/batch-move", json!({"operations": []})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"results": []}));
}

// =============================================================================
// Verification Tests
// =============================================================================

#[tokio::test]
async fn test_verify_default_algorithm() {
    let (app, _temp_dir) = create_test_app();

    let uri = format!("/verify?filePath=hello.txt&expectedHash={HELLO_MD5}");
    let (status, body) = get(&app, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "filePath": "hello.txt",
            "algorithm": "md5",
            "expectedHash": HELLO_MD5,
            "actualHash": HELLO_MD5,
            "match": true,
        })
    );
}

#[tokio::test]
async fn test_verify_sha256_mismatch() {
    let (app, _temp_dir) = create_test_app();

    let (status, body) = get(
        &app,
        "/verify?filePath=hello.txt&algorithm=sha256&expectedHash=deadbeef",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["actualHash"], HELLO_SHA256);
    assert_eq!(body["match"], false);
}

#[tokio::test]
async fn test_verify_sha384_echoes_algorithm() {
    let (app, _temp_dir) = create_test_app();

    let (status, body) = get(
        &app,
        "/verify?filePath=hello.txt&algorithm=SHA384&expectedHash=abc",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["algorithm"], "SHA384");
    assert_eq!(body["actualHash"].as_str().unwrap().len(), 96);
    assert_eq!(body["match"], false);
}

#[tokio::test]
async fn test_verify_missing_parameters() {
    let (app, _temp_dir) = create_test_app();

    let (status, body) = get(&app, "/verify?filePath=hello.txt").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_body(body).error,
        "filePath and expectedHash are required"
    );

    let (status, _) = get(&app, "/verify?expectedHash=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_errors() {
    let (app, _temp_dir) = create_test_app();

    let (status, body) = get(
        &app,
        "/verify?filePath=hello.txt&algorithm=crc32&expectedHash=abc",
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let err = error_body(body);
    assert_eq!(err.error, "File verification failed");
    assert_eq!(err.code, ErrorCode::UnsupportedAlgorithm);
    assert!(err.details.unwrap().contains("crc32"));

    let (status, body) = get(&app, "/verify?filePath=nope.txt&expectedHash=abc").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let err = error_body(body);
    assert_eq!(err.error, "File verification failed");
    assert_eq!(err.code, ErrorCode::NotFound);

    let (status, body) = get(&app, "/verify?filePath=../hello.txt&expectedHash=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_body(body).code, ErrorCode::OutsideSandbox);
}

// =============================================================================
// Health Tests
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (app, temp_dir) = create_test_app();

    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(
        body["root"],
        fs::canonicalize(temp_dir.path())
            .unwrap()
            .display()
            .to_string()
    );
}
