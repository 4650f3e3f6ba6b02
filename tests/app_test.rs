#![cfg(feature = "web")]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use common::RecordingTransport;
use serde_json::Value;
use sprinkler_permit::app::router;
use sprinkler_permit::config::Config;
use sprinkler_permit::handler::SubmissionService;
use std::sync::Arc;
use tower::ServiceExt;

fn app(dir: &std::path::Path, transport: Arc<RecordingTransport>) -> axum::Router {
    app_with_config(dir, common::test_config(dir), transport)
}

fn app_with_config(
    dir: &std::path::Path,
    config: Config,
    transport: Arc<RecordingTransport>,
) -> axum::Router {
    let store = Arc::new(common::file_store(dir));
    router(SubmissionService::new(Arc::new(config), store, transport).unwrap())
}

/// A submission whose request body is over 2 MiB.
fn large_submission() -> Vec<u8> {
    let mut record = common::sample_submission();
    let document = b"%PDF-1.4\n".repeat(256 * 1024);
    record["pdf_base64"] = Value::String(STANDARD.encode(document));
    serde_json::to_vec(&record).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "text/plain;charset=utf-8")
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn test_submit_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let body = serde_json::to_vec(&common::sample_submission()).unwrap();

    let response = app(dir.path(), transport.clone())
        .oneshot(post("/api/submit", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["success"], Value::Bool(true));
    assert_eq!(json["emailSent"], Value::Bool(true));
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_malformed_body_still_returns_ok_status() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());

    let response = app(dir.path(), transport.clone())
        .oneshot(post("/", "definitely not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["success"], Value::Bool(false));
    assert!(json["message"].as_str().unwrap().starts_with("Error processing form"));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_large_pdf_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let body = large_submission();
    assert!(body.len() > 2 * 1024 * 1024);

    let response = app(dir.path(), transport.clone())
        .oneshot(post("/api/submit", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["success"], Value::Bool(true));
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].attachments.len(), 1);
    assert_eq!(sent[0].attachments[0].data.len(), 9 * 256 * 1024);
    println!("✓ Large PDF submission accepted");
}

#[tokio::test]
async fn test_body_over_limit_is_reported_in_band() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let config = Config {
        max_body_bytes: 64 * 1024,
        ..common::test_config(dir.path())
    };

    let response = app_with_config(dir.path(), config, transport.clone())
        .oneshot(post("/api/submit", large_submission()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["success"], Value::Bool(false));
    let message = json["message"].as_str().unwrap();
    assert!(message.starts_with("Error processing form: Could not read request body"));
    assert!(transport.sent().is_empty());
    assert!(!dir.path().join("Sprinkler_Permit_Log.bin.gz").exists());
    println!("✓ Oversized body answered in-band");
}

#[tokio::test]
async fn test_summary_and_csv_export() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let app = app(dir.path(), transport);

    let body = serde_json::to_vec(&common::sample_submission()).unwrap();
    let response = app.clone().oneshot(post("/api/submit", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::get("/api/summary").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["totalSubmissions"], Value::from(1));
    assert_eq!(json["pdfsGenerated"], Value::from(1));
    assert_eq!(json["pendingReview"], Value::from(0));

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/export?format=csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let csv = String::from_utf8(body_bytes(response).await).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("Timestamp,Form ID,Scroll No"));
    assert!(lines.next().unwrap().ends_with(",SENT"));

    let response = app
        .oneshot(
            Request::get("/api/export?format=pdf")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_xlsx_export() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());

    let response = app(dir.path(), transport)
        .oneshot(Request::get("/api/export").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.starts_with(b"PK"));
}
