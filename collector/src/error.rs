//! HTTP error responses.

use crate::ingest::IngestError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use shared::codec::CodecError;
use shared::models::MetricValidationError;
use shared::storage::MetricStoreError;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

/// An error returned by a handler or middleware, rendered as
/// `(StatusCode, Json<ErrorBody>)`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    /// Creates an error with the given status, code and message.
    pub fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.to_string(),
                message: message.into(),
            },
        }
    }

    /// 400 with the given code.
    pub fn bad_request(error: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, message)
    }

    /// 404 with the given code.
    pub fn not_found(error: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error, message)
    }

    /// 500 with the given code.
    pub fn internal(error: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, message)
    }

    /// Returns the HTTP status of the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<MetricValidationError> for ApiError {
    fn from(err: MetricValidationError) -> Self {
        if err.is_not_found() {
            Self::not_found("unknown_metric", err.to_string())
        } else {
            Self::bad_request("invalid_value", err.to_string())
        }
    }
}

impl From<MetricStoreError> for ApiError {
    fn from(err: MetricStoreError) -> Self {
        tracing::error!(error = %err, "Storage operation failed");
        Self::internal("storage_error", err.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Invalid(err) => err.into(),
            IngestError::EmptyBatch => {
                Self::bad_request("empty_batch", "At least one metric is required")
            }
            IngestError::Storage(err) => err.into(),
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        let code = match &err {
            CodecError::MissingSignature => "missing_signature",
            CodecError::MalformedSignature(_) | CodecError::SignatureMismatch => "bad_signature",
            CodecError::Compression(_) => "invalid_gzip",
            CodecError::InvalidKey => "invalid_key",
        };
        Self::bad_request(code, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request("invalid_json", err.to_string())
    }
}
