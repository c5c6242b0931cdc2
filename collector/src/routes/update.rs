//! Metric ingestion endpoints.
//!
//! - `POST /update/{type}/{id}/{value}`: path-form single update
//! - `POST /update` and `POST /updates`: JSON body, one record or an array

use crate::error::ApiError;
use crate::ingest;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use shared::models::{Metric, MetricPayload};

/// Body of a JSON update: a single record or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpdateRequest {
    /// A single record.
    Single(MetricPayload),
    /// An array of records.
    Batch(Vec<MetricPayload>),
}

/// Creates the update routes.
pub fn update_routes(state: AppState) -> Router {
    Router::new()
        .route("/update/{kind}/{id}/{value}", post(update_from_path))
        .route("/update", post(update_from_json))
        .route("/updates", post(update_from_json))
        .with_state(state)
}

async fn update_from_path(
    State(state): State<AppState>,
    Path((kind, id, value)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let metric = ingest::parse_path_metric(&kind, &id, &value)?;
    ingest::ingest_one(state.store(), metric).await?;
    Ok(StatusCode::OK)
}

async fn update_from_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: UpdateRequest = serde_json::from_slice(&body)?;

    match request {
        UpdateRequest::Single(payload) => {
            let metric = Metric::try_from(payload)?;
            let stored = ingest::ingest_one(state.store(), metric).await?;
            Ok(Json(stored).into_response())
        }
        UpdateRequest::Batch(payloads) => {
            let stored = ingest::ingest_batch(state.store(), payloads).await?;
            Ok(Json(stored).into_response())
        }
    }
}
