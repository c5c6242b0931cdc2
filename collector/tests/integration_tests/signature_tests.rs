//! Integration tests for request verification and response signing.

use crate::common::{send, signed_test_app, test_signer};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use shared::codec::{self, SIGNATURE_HEADER};

fn batch_body() -> Vec<u8> {
    serde_json::to_vec(&json!([{"id": "Signed", "type": "counter", "delta": 1}])).unwrap()
}

fn update_request(body: Vec<u8>, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/updates")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_signed_request_is_accepted_and_response_signed() {
    let (app, state) = signed_test_app();
    let body = batch_body();
    let signature = test_signer().sign(&body);

    let (status, headers, response) = send(app, update_request(body, Some(signature))).await;

    assert_eq!(status, StatusCode::OK);
    let response_signature = headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
    test_signer().verify(&response, response_signature).unwrap();
    assert!(state.store().get("Signed").await.unwrap().is_some());
}

#[tokio::test]
async fn test_wrong_signature_is_rejected_and_nothing_stored() {
    let (app, state) = signed_test_app();
    let body = batch_body();
    let signature = test_signer().sign(b"something else");

    let (status, _, response) = send(app, update_request(body, Some(signature))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(error["error"], "bad_signature");
    assert!(state.store().get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let (app, state) = signed_test_app();

    let (status, _, response) = send(app, update_request(batch_body(), None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(error["error"], "missing_signature");
    assert!(state.store().get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_signature_covers_decompressed_body() {
    let (app, state) = signed_test_app();
    let body = batch_body();
    let signature = test_signer().sign(&body);

    let request = Request::builder()
        .method("POST")
        .uri("/updates")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(codec::compress(&body).unwrap()))
        .unwrap();

    let (status, _, _) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(state.store().get("Signed").await.unwrap().is_some());
}

#[tokio::test]
async fn test_reads_need_no_signature() {
    let (app, _state) = signed_test_app();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, headers, page) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    let signature = headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
    test_signer().verify(&page, signature).unwrap();
}
