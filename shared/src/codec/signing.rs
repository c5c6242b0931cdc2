//! HMAC-SHA256 body signatures.

use super::CodecError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies bodies with a shared key.
///
/// # Example
///
/// ```
/// use shared::codec::Signer;
///
/// let signer = Signer::new("secret").unwrap();
/// let signature = signer.sign(b"[]");
/// assert!(signer.verify(b"[]", &signature).is_ok());
/// assert!(signer.verify(b"[ ]", &signature).is_err());
/// ```
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl Signer {
    /// Creates a signer for the given shared key.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] if the MAC rejects the key.
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, CodecError> {
        let mac = HmacSha256::new_from_slice(key.as_ref()).map_err(|_| CodecError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// Returns the base64url (unpadded) HMAC-SHA256 of `body`.
    #[must_use]
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(body);
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Checks `signature` against `body` in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedSignature`] if the signature is not
    /// base64url, or [`CodecError::SignatureMismatch`] if it does not match.
    pub fn verify(&self, body: &[u8], signature: &str) -> Result<(), CodecError> {
        let expected = URL_SAFE_NO_PAD.decode(signature.trim())?;
        let mut mac = self.mac.clone();
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| CodecError::SignatureMismatch)
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}
