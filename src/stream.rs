//! Streaming chunk encryption.
//!
//! Large payloads stream as independent XChaCha20-Poly1305 chunks under an
//! application-exported key. Each chunk's 24-byte nonce is the 16-byte
//! application prefix followed by the little-endian sequence number, so a
//! (key, prefix) pair never repeats a nonce as long as sequence numbers do
//! not repeat. Sequence numbers are not embedded in the ciphertext; the
//! enclosing framing conveys them, and consumers must reject duplicates and
//! out-of-order delivery.

use crate::errors::{HpkeError, Result};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

/// Required nonce prefix length in bytes.
pub const NONCE_PREFIX_LEN: usize = 16;

/// Default chunk-count limit for a [`StreamLimiter`].
pub const DEFAULT_MAX_CHUNKS: u64 = 1_000_000;

/// Default plaintext-byte limit for a [`StreamLimiter`].
pub const DEFAULT_MAX_BYTES: u64 = 1_000_000_000;

fn chunk_nonce(prefix: &[u8], seq: u64) -> Result<[u8; 24]> {
    if prefix.len() != NONCE_PREFIX_LEN {
        return Err(HpkeError::StreamNoncePrefixLen(prefix.len()));
    }
    let mut nonce = [0u8; 24];
    nonce[..NONCE_PREFIX_LEN].copy_from_slice(prefix);
    nonce[NONCE_PREFIX_LEN..].copy_from_slice(&seq.to_le_bytes());
    Ok(nonce)
}

/// Encrypts one chunk. Pure: no internal sequence tracking.
///
/// # Examples
///
/// ```
/// use x402_hpke::stream::{open_chunk, seal_chunk};
///
/// let key = [1u8; 32];
/// let prefix = [2u8; 16];
/// let sealed = seal_chunk(&key, &prefix, 0, b"chunk data", None).unwrap();
/// let opened = open_chunk(&key, &prefix, 0, &sealed, None).unwrap();
/// assert_eq!(opened, b"chunk data");
/// ```
pub fn seal_chunk(
    key: &[u8; 32],
    prefix: &[u8],
    seq: u64,
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let nonce = chunk_nonce(prefix, seq)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: aad.unwrap_or(&[]),
            },
        )
        .map_err(|_| HpkeError::InvalidEnvelope("chunk encryption failed".to_string()))
}

/// Decrypts and authenticates one chunk.
///
/// Any mismatch (wrong key, wrong sequence number, wrong AAD, or tampered
/// ciphertext) fails with the generic invalid-envelope kind.
pub fn open_chunk(
    key: &[u8; 32],
    prefix: &[u8],
    seq: u64,
    ciphertext: &[u8],
    aad: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let nonce = chunk_nonce(prefix, seq)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: ciphertext,
                aad: aad.unwrap_or(&[]),
            },
        )
        .map_err(|_| HpkeError::InvalidEnvelope("chunk rejected".to_string()))
}

/// Stateful wrapper enforcing chunk-count and byte limits on the sealing
/// side.
///
/// Limits are checked before any encryption happens, so a rejected chunk has
/// no observable effect. Opening is not metered; the open method exists for
/// interface symmetry.
///
/// # Examples
///
/// ```
/// use x402_hpke::stream::StreamLimiter;
///
/// let mut limiter = StreamLimiter::new().with_max_chunks(1);
/// let key = [1u8; 32];
/// let prefix = [2u8; 16];
///
/// assert!(limiter.seal_chunk(&key, &prefix, 0, b"a", None).is_ok());
/// let err = limiter.seal_chunk(&key, &prefix, 1, b"b", None).unwrap_err();
/// assert_eq!(err.code(), "AEAD_LIMIT");
/// ```
#[derive(Debug, Clone)]
pub struct StreamLimiter {
    max_chunks: u64,
    max_bytes: u64,
    chunks_used: u64,
    bytes_used: u64,
}

impl Default for StreamLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamLimiter {
    /// Creates a limiter with the default limits.
    pub fn new() -> Self {
        Self {
            max_chunks: DEFAULT_MAX_CHUNKS,
            max_bytes: DEFAULT_MAX_BYTES,
            chunks_used: 0,
            bytes_used: 0,
        }
    }

    /// Sets the maximum number of chunks this limiter will seal.
    pub fn with_max_chunks(mut self, max_chunks: u64) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Sets the maximum total plaintext bytes this limiter will seal.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Chunks sealed so far.
    pub fn chunks_used(&self) -> u64 {
        self.chunks_used
    }

    /// Plaintext bytes sealed so far.
    pub fn bytes_used(&self) -> u64 {
        self.bytes_used
    }

    /// Seals a chunk if neither limit would be exceeded, then updates the
    /// counters.
    pub fn seal_chunk(
        &mut self,
        key: &[u8; 32],
        prefix: &[u8],
        seq: u64,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        if self.chunks_used + 1 > self.max_chunks {
            return Err(HpkeError::AeadLimit(format!(
                "chunk limit of {} reached",
                self.max_chunks
            )));
        }
        let plaintext_len = plaintext.len() as u64;
        if self.bytes_used + plaintext_len > self.max_bytes {
            return Err(HpkeError::AeadLimit(format!(
                "byte limit of {} reached",
                self.max_bytes
            )));
        }

        let ciphertext = seal_chunk(key, prefix, seq, plaintext, aad)?;
        self.chunks_used += 1;
        self.bytes_used += plaintext_len;
        Ok(ciphertext)
    }

    /// Opens a chunk. Not metered.
    pub fn open_chunk(
        &self,
        key: &[u8; 32],
        prefix: &[u8],
        seq: u64,
        ciphertext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        open_chunk(key, prefix, seq, ciphertext, aad)
    }
}
