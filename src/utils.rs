//! Utility functions for x402-hpke operations.
//!
//! This module provides the base64url helpers shared by the envelope codec,
//! the KEM core, and the JWK types. All binary fields on the wire
//! (`enc`, `aad`, `ct`, JWK coordinates) use base64url without padding.

use crate::errors::{HpkeError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

/// Encodes bytes as base64url without padding.
///
/// # Examples
///
/// ```
/// use x402_hpke::utils::b64url_encode;
///
/// assert_eq!(b64url_encode(b"hello"), "aGVsbG8");
/// ```
pub fn b64url_encode(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(input.as_ref())
}

/// Decodes a base64url string (no padding) into bytes.
///
/// # Examples
///
/// ```
/// use x402_hpke::utils::b64url_decode;
///
/// assert_eq!(b64url_decode("aGVsbG8").unwrap(), b"hello");
/// assert!(b64url_decode("not base64!").is_err());
/// ```
pub fn b64url_decode(input: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(input.as_bytes())
        .map_err(|e| HpkeError::InvalidEnvelope(format!("invalid base64url: {}", e)))
}

/// Decodes a base64url string into a fixed 32-byte array.
///
/// Used for X25519 public keys, private scalars, and the envelope `enc`
/// field, all of which are exactly 32 bytes.
pub fn b64url_decode_32(input: &str) -> Result<[u8; 32]> {
    let bytes = b64url_decode(input)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        HpkeError::InvalidEnvelope(format!("expected 32 bytes, got {}", bytes.len()))
    })
}
