//! Integration tests for gzip request decoding and response compression.

use crate::common::{send, test_app};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use shared::codec;

#[tokio::test]
async fn test_gzip_request_body_is_ingested() {
    let (app, _state) = test_app();
    let body = serde_json::to_vec(&json!({"id": "Zipped", "type": "gauge", "value": 4.5})).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/update")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(codec::compress(&body).unwrap()))
        .unwrap();

    let (status, _, response) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    let echoed: Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(echoed, json!({"id": "Zipped", "type": "gauge", "value": 4.5}));
}

#[tokio::test]
async fn test_corrupt_gzip_is_rejected() {
    let (app, _state) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/update")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from("definitely not gzip"))
        .unwrap();

    let (status, _, response) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(error["error"], "invalid_gzip");
}

#[tokio::test]
async fn test_response_is_gzipped_when_accepted() {
    let (app, _state) = test_app();
    let body = serde_json::to_vec(&json!([{"id": "Big", "type": "counter", "delta": 3}])).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/updates")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::from(body))
        .unwrap();

    let (status, headers, response) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_ENCODING).unwrap(), "gzip");
    let decoded = codec::decompress(&response).unwrap();
    let echoed: Value = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(echoed, json!([{"id": "Big", "type": "counter", "delta": 3}]));
}

#[tokio::test]
async fn test_plain_response_without_accept_encoding() {
    let (app, _state) = test_app();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, headers, _) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
}
