//! Metric lookup endpoints.
//!
//! - `GET /value/{type}/{id}`: the stored value as plain text
//! - `POST /value`: the stored record as JSON, looked up by `{"id", "type"}`

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shared::models::{Metric, MetricKind};

/// Body of a JSON lookup.
#[derive(Debug, Deserialize)]
pub struct ValueRequest {
    /// Metric id.
    pub id: String,
    /// Expected metric type.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Creates the value routes.
pub fn value_routes(state: AppState) -> Router {
    Router::new()
        .route("/value/{kind}/{id}", get(value_from_path))
        .route("/value", post(value_from_json))
        .with_state(state)
}

async fn lookup(state: &AppState, kind: &str, id: &str) -> Result<Metric, ApiError> {
    let kind: MetricKind = kind.parse()?;
    let stored = state
        .store()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("not_found", format!("There is no metric '{id}'")))?;

    if stored.kind() != kind {
        return Err(ApiError::not_found(
            "kind_mismatch",
            format!("Metric '{id}' has other type: '{}'", stored.kind()),
        ));
    }
    Ok(stored)
}

async fn value_from_path(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let stored = lookup(&state, &kind, &id).await?;
    Ok(stored.value.to_string())
}

async fn value_from_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Metric>, ApiError> {
    let request: ValueRequest = serde_json::from_slice(&body)?;
    let stored = lookup(&state, &request.kind, &request.id).await?;
    Ok(Json(stored))
}
