//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup and HTTP request helpers.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use collector::{create_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use shared::codec::Signer;

/// Key shared by signed test apps and their requests.
pub const TEST_KEY: &str = "integration-secret";

/// Creates a test router with a fresh in-memory store.
///
/// # Returns
///
/// A tuple containing the configured router and the app state.
pub fn test_app() -> (Router, AppState) {
    let state = AppState::with_in_memory_store();
    let router = create_router(state.clone());
    (router, state)
}

/// Creates a test router that requires [`TEST_KEY`] signatures.
pub fn signed_test_app() -> (Router, AppState) {
    let state = AppState::with_in_memory_store().with_signer(test_signer());
    let router = create_router(state.clone());
    (router, state)
}

/// Signer for [`TEST_KEY`].
pub fn test_signer() -> Signer {
    Signer::new(TEST_KEY).unwrap()
}

/// Sends `request` and returns the status, headers and raw body.
pub async fn send(
    app: Router,
    request: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status, headers, body.to_vec())
}

/// Helper to make a POST request with JSON body.
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn post_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let (status, _, body) = send(app, request).await;
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a POST request without a body.
pub async fn post_empty(app: Router, uri: &str) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await.0
}

/// Helper to make a GET request returning the body as text.
pub async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = send(app, request).await;
    (status, String::from_utf8(body).unwrap())
}
