//! Integration tests for metric lookup and listing.

use crate::common::{get_text, post_empty, post_json, test_app};
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_json_lookup_returns_stored_record() {
    let (app, _state) = test_app();
    post_empty(app.clone(), "/update/counter/PollCount/7").await;

    let (status, record) = post_json(
        app,
        "/value",
        &json!({"id": "PollCount", "type": "counter"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(record, json!({"id": "PollCount", "type": "counter", "delta": 7}));
}

#[tokio::test]
async fn test_json_lookup_of_absent_metric_is_404() {
    let (app, _state) = test_app();

    let (status, body) = post_json(app, "/value", &json!({"id": "nope", "type": "gauge"})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_lookup_with_wrong_kind_is_404() {
    let (app, _state) = test_app();
    post_empty(app.clone(), "/update/gauge/Alloc/12.5").await;

    let (status, body) = post_json(app, "/value", &json!({"id": "Alloc", "type": "counter"})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "kind_mismatch");
}

#[tokio::test]
async fn test_gauge_text_has_no_trailing_zeros() {
    let (app, _state) = test_app();
    post_empty(app.clone(), "/update/gauge/Whole/3").await;

    assert_eq!(get_text(app, "/value/gauge/Whole").await.1, "3");
}

#[tokio::test]
async fn test_index_lists_every_metric_in_id_order() {
    let (app, _state) = test_app();
    post_empty(app.clone(), "/update/gauge/zeta/1.5").await;
    post_empty(app.clone(), "/update/counter/alpha/2").await;

    let (status, page) = get_text(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    let alpha = page.find("alpha: 2").unwrap();
    let zeta = page.find("zeta: 1.5").unwrap();
    assert!(alpha < zeta);
}

#[tokio::test]
async fn test_ping_without_database_is_500() {
    let (app, _state) = test_app();

    let (status, _) = get_text(app, "/ping").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
