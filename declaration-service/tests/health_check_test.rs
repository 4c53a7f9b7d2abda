//! Health endpoint.

mod common;

use axum::http::StatusCode;
use common::{read_json, TestApp};

#[tokio::test]
async fn health_check_reports_store_status() {
    let app = TestApp::spawn().await;

    let response = app.request("GET", "/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "declaration-service-test");
    assert_eq!(body["checks"]["store"], "up");
}
