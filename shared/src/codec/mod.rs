//! Wire codec shared by the agent and the collector.
//!
//! Bodies travel as JSON, optionally gzip-compressed, and optionally signed with
//! an HMAC-SHA256 of the uncompressed JSON bytes carried in the
//! [`SIGNATURE_HEADER`] header.

pub mod gzip;
pub mod signing;

pub use gzip::{accepts_gzip, compress, decompress};
pub use signing::Signer;

use thiserror::Error;

/// Header carrying the base64url (unpadded) HMAC-SHA256 of a body.
pub const SIGNATURE_HEADER: &str = "HashSHA256";

/// Errors produced while signing, verifying or (de)compressing bodies.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The signing key was rejected by the MAC.
    #[error("Invalid signing key")]
    InvalidKey,

    /// A signature was required but the header is absent.
    #[error("There is no HashSHA256 header to check the signature")]
    MissingSignature,

    /// The signature header is not valid base64url.
    #[error("Malformed signature: {0}")]
    MalformedSignature(#[from] base64::DecodeError),

    /// The signature does not match the body.
    #[error("Signature does not match the request body")]
    SignatureMismatch,

    /// The body could not be compressed or decompressed.
    #[error("Compression error: {0}")]
    Compression(#[from] std::io::Error),
}
