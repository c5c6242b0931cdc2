//! Backend connectivity check.
//!
//! `GET /ping` reports whether the relational backend answers. The in-memory
//! backend has nothing to check and always answers 500.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, routing::get, Router};

/// Creates the ping routes.
pub fn ping_routes(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .with_state(state)
}

async fn ping(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.store().ping().await?;
    Ok("OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_ping_without_database_fails() {
        let app = ping_routes(AppState::with_in_memory_store());

        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
