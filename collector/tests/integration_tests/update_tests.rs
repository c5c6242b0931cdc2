//! Integration tests for metric ingestion.

use crate::common::{get_text, post_empty, post_json, test_app};
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_counter_accumulates_across_path_updates() {
    let (app, _state) = test_app();

    assert_eq!(post_empty(app.clone(), "/update/counter/A/10").await, StatusCode::OK);
    assert_eq!(post_empty(app.clone(), "/update/counter/A/5").await, StatusCode::OK);

    let (status, body) = get_text(app, "/value/counter/A").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "15");
}

#[tokio::test]
async fn test_gauge_batch_keeps_last_value() {
    let (app, _state) = test_app();

    let (status, echoed) = post_json(
        app.clone(),
        "/updates",
        &json!([
            {"id": "X", "type": "gauge", "value": 1.5},
            {"id": "X", "type": "gauge", "value": 2.5}
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(echoed, json!([{"id": "X", "type": "gauge", "value": 2.5}]));

    let (_, body) = get_text(app, "/value/gauge/X").await;
    assert_eq!(body, "2.5");
}

#[tokio::test]
async fn test_batch_sums_counters_in_first_seen_order() {
    let (app, _state) = test_app();

    let (status, echoed) = post_json(
        app,
        "/updates",
        &json!([
            {"id": "PollCount", "type": "counter", "delta": 2},
            {"id": "Alloc", "type": "gauge", "value": 10.0},
            {"id": "PollCount", "type": "counter", "delta": 3}
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        echoed,
        json!([
            {"id": "PollCount", "type": "counter", "delta": 5},
            {"id": "Alloc", "type": "gauge", "value": 10.0}
        ])
    );
}

#[tokio::test]
async fn test_replayed_batch_is_idempotent_for_gauges_only() {
    let (app, _state) = test_app();
    let batch = json!([
        {"id": "Load", "type": "gauge", "value": 0.75},
        {"id": "Hits", "type": "counter", "delta": 4}
    ]);

    post_json(app.clone(), "/updates", &batch).await;
    post_json(app.clone(), "/updates", &batch).await;

    assert_eq!(get_text(app.clone(), "/value/gauge/Load").await.1, "0.75");
    assert_eq!(get_text(app, "/value/counter/Hits").await.1, "8");
}

#[tokio::test]
async fn test_invalid_record_rejects_whole_batch() {
    let (app, state) = test_app();

    let (status, body) = post_json(
        app,
        "/updates",
        &json!([
            {"id": "ok", "type": "gauge", "value": 1.0},
            {"id": "broken", "type": "gauge"}
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_value");
    assert!(state.store().get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let (app, _state) = test_app();

    let (status, body) = post_json(app, "/updates", &json!([])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty_batch");
}

#[tokio::test]
async fn test_path_update_error_mapping() {
    let (app, _state) = test_app();

    assert_eq!(
        post_empty(app.clone(), "/update/gauge/G/abc").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        post_empty(app.clone(), "/update/counter/C/1.5").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        post_empty(app.clone(), "/update/unknown/C/1").await,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        post_empty(app, "/update/counter/C").await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_kind_change_replaces_record() {
    let (app, _state) = test_app();

    post_empty(app.clone(), "/update/counter/M/3").await;
    post_empty(app.clone(), "/update/gauge/M/1.25").await;

    assert_eq!(get_text(app.clone(), "/value/gauge/M").await.1, "1.25");
    assert_eq!(
        get_text(app, "/value/counter/M").await.0,
        StatusCode::NOT_FOUND
    );
}
