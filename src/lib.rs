//! # x402-hpke
//!
//! A provider-agnostic HPKE envelope codec for the x402 payment protocol,
//! binding application payloads to rich, cryptographically-authenticated
//! metadata.
//!
//! Peers exchange opaque envelopes over untrusted intermediaries (HTTP
//! proxies, gateways, message queues) while keeping payloads confidential
//! and metadata tamper-evident. A selectively-public "sidecar" projection
//! lets legacy middleware route and rate-limit on a chosen subset of fields
//! without weakening authentication: every projected value is re-derived
//! from the authenticated AAD on open and compared in constant time.
//!
//! ## Features
//!
//! - **One-shot seal/open**: X25519 + HKDF-SHA256 + ChaCha20-Poly1305 with a
//!   strictly bound derivation context
//! - **Transport model**: typed PAYMENT / PAYMENT_RESPONSE /
//!   PAYMENT_REQUIRED / OTHER_REQUEST / OTHER_RESPONSE messages with
//!   per-type validation
//! - **Canonical AAD**: byte-deterministic metadata encoding for
//!   cross-implementation interoperability
//! - **Sidecar projection**: selective public exposure of headers and body
//!   keys, verified against the AAD
//! - **Streaming**: per-chunk XChaCha20-Poly1305 with sequence-bound nonces
//!   and anti-abuse limits
//! - **JWKS**: recipient key discovery with HTTPS-only fetching and
//!   TTL-clamped caching
//!
//! ## Quick Start
//!
//! ```
//! use serde_json::json;
//! use x402_hpke::{open, seal, KeyPair, OpenRequest, SealRequest, Transport, Visibility};
//!
//! # fn main() -> Result<(), x402_hpke::HpkeError> {
//! // The recipient generates a key pair and publishes the public half.
//! let pair = KeyPair::generate(Some("billing-2026"));
//!
//! // Seal a payment, exposing the X-Payment header to middleware.
//! let transport = Transport::payment(json!({"payload": {"invoiceId": "inv_1"}}))?;
//! let sealed = seal(
//!     &SealRequest::new("myapp", "billing-2026", pair.public.clone(), transport)
//!         .with_public(Visibility::Names(vec!["X-Payment".to_string()])),
//! )?;
//!
//! // The recipient opens the envelope and verifies the sidecar it saw.
//! let opened = open(
//!     &OpenRequest::new("myapp", pair.private.clone(), sealed.envelope)
//!         .with_expected_kid("billing-2026")
//!         .with_public_headers(sealed.sidecar.unwrap().public_headers.unwrap()),
//! )?;
//!
//! assert_eq!(opened.headers[0].value, json!({"payload": {"invoiceId": "inv_1"}}));
//! # Ok(())
//! # }
//! ```
//!
//! ## Protocol Overview
//!
//! Sealing runs a fixed pipeline:
//!
//! 1. **Validate** the transport against its per-type rules
//! 2. **Normalize** it into a headers list and body object
//! 3. **Canonicalize** `"<ns>|v1|<headers>|<body>"` into AAD bytes
//! 4. **Encapsulate** to the recipient key and derive the AEAD key/nonce via
//!    HKDF with a context string binding suite, namespace, and both public keys
//! 5. **Encrypt** the canonical body as plaintext with the AAD authenticated
//! 6. **Project** the requested sidecar subset
//!
//! Opening reverses the pipeline, binding every check to the envelope record
//! itself. Each envelope is self-contained; the protocol imposes no ordering
//! between envelopes.
//!
//! ## Security
//!
//! - **Contributory ECDH**: all-zero public keys and all-zero shared secrets
//!   are rejected
//! - **Context binding**: namespace, ephemeral key, and recipient key are
//!   baked into the HKDF info string; any disagreement fails decryption
//! - **No oracle**: AEAD tag failures surface as a generic invalid-envelope
//!   error
//! - **Zeroization**: ephemeral scalars and derived key material are wiped
//!   after use
//! - **Replay prevention is out of scope**: bind a unique id or expiry into
//!   the transport content so the AAD covers it, and dedupe at the
//!   application layer
//!
//! ## References
//!
//! - [x402 Specification](https://github.com/coinbase/x402)
//! - [RFC 9180: Hybrid Public Key Encryption](https://www.rfc-editor.org/rfc/rfc9180)
//! - [RFC 7517: JSON Web Key](https://www.rfc-editor.org/rfc/rfc7517)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod aad;
pub mod canonical;
pub mod envelope;
pub mod errors;
pub mod headers;
pub mod jwks;
pub mod kem;
pub mod keys;
pub mod sidecar;
pub mod stream;
pub mod transport;
pub mod utils;

// Re-export commonly used items
pub use envelope::{
    open, seal, Envelope, OpenRequest, Opened, SealRequest, Sealed, ENVELOPE_MEDIA_TYPE,
    ENVELOPE_TYPE, ENVELOPE_VERSION,
};
pub use errors::{HpkeError, Result};
pub use headers::{HeaderEntry, HeaderRegistry};
pub use jwks::{JwksClient, JwksFetch};
pub use kem::{AEAD_NAME, KDF_NAME, KEM_NAME, SUITE_NAME};
pub use keys::{public_from_private, select_jwk, Jwk, Jwks, KeyPair};
pub use sidecar::{Sidecar, Visibility};
pub use stream::{open_chunk, seal_chunk, StreamLimiter};
pub use transport::{Extension, Transport, TransportType};
