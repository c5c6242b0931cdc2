//! HTML listing of stored metrics.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, response::Html, routing::get, Router};
use std::fmt::Write;

/// Creates the index routes.
pub fn index_routes(state: AppState) -> Router {
    Router::new().route("/", get(index)).with_state(state)
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let metrics = state.store().get_all().await?;

    let mut page = String::from("<html><body><ul>");
    for metric in &metrics {
        // Writing into a String cannot fail.
        let _ = write!(
            page,
            "<li>{}: {}</li>",
            escape_html(&metric.id),
            metric.value
        );
    }
    page.push_str("</ul></body></html>");

    Ok(Html(page))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use shared::models::Metric;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_index_lists_metrics_sorted() {
        let state = AppState::with_in_memory_store();
        state.store().record(Metric::gauge("b", 0.5)).await.unwrap();
        state.store().record(Metric::counter("a", 3)).await.unwrap();

        let response = index_routes(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let page = String::from_utf8(body.to_vec()).unwrap();
        assert!(page.contains("<li>a: 3</li><li>b: 0.5</li>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a&b>"), "&lt;a&amp;b&gt;");
    }
}
