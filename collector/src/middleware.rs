//! Request and response middleware.
//!
//! `decompress_request` turns a gzip request body back into plain bytes, and
//! `verify_signature` checks the `HashSHA256` header of incoming bodies and
//! signs outgoing ones. Each passes requests through untouched when its
//! condition does not apply.

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use shared::codec::{self, CodecError, Signer, SIGNATURE_HEADER};

/// Largest request body accepted by the middleware.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

fn signature_header() -> HeaderName {
    HeaderName::from_static("hashsha256")
}

/// Decompresses request bodies sent with `Content-Encoding: gzip`.
///
/// # Errors
///
/// Responds with 400 if the body is not a valid gzip stream.
pub async fn decompress_request(request: Request, next: Next) -> Result<Response, ApiError> {
    let is_gzip = request
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(codec::accepts_gzip);
    if !is_gzip {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let compressed = to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|e| ApiError::bad_request("unreadable_body", e.to_string()))?;
    let decoded = codec::decompress(&compressed).map_err(CodecError::from)?;

    parts.headers.remove(CONTENT_ENCODING);
    parts.headers.remove(CONTENT_LENGTH);
    tracing::trace!(
        compressed = compressed.len(),
        decoded = decoded.len(),
        "Decompressed request body"
    );

    Ok(next.run(Request::from_parts(parts, Body::from(decoded))).await)
}

/// Verifies request signatures and signs responses when a key is configured.
///
/// Requests other than GET and HEAD must carry a `HashSHA256` header matching
/// the HMAC-SHA256 of their (decompressed) body. The body is buffered and
/// handed on intact.
///
/// # Errors
///
/// Responds with 400 if the signature is missing or does not match.
pub async fn verify_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(signer) = state.signer() else {
        return Ok(next.run(request).await);
    };

    let request = if matches!(*request.method(), Method::GET | Method::HEAD) {
        request
    } else {
        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, MAX_BODY_SIZE)
            .await
            .map_err(|e| ApiError::bad_request("unreadable_body", e.to_string()))?;

        let signature = parts
            .headers
            .get(SIGNATURE_HEADER)
            .ok_or(CodecError::MissingSignature)?
            .to_str()
            .map_err(|_| ApiError::bad_request("bad_signature", "Signature is not ASCII"))?;
        if let Err(err) = signer.verify(&bytes, signature) {
            tracing::warn!(uri = %parts.uri, error = %err, "Rejected request with bad signature");
            return Err(err.into());
        }

        Request::from_parts(parts, Body::from(bytes))
    };

    let response = next.run(request).await;
    sign_response(signer, response).await
}

async fn sign_response(signer: &Signer, response: Response) -> Result<Response, ApiError> {
    let (mut parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ApiError::internal("unreadable_response", e.to_string()))?;

    let signature = HeaderValue::try_from(signer.sign(&bytes))
        .map_err(|e| ApiError::internal("signing_failed", e.to_string()))?;
    parts.headers.insert(signature_header(), signature);

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
