//! Envelope seal and open.
//!
//! Sealing validates the transport, builds canonical AAD, derives a
//! per-envelope key and nonce through the KEM/KDF core, encrypts the
//! canonical body with ChaCha20-Poly1305, and emits the self-describing
//! envelope record plus an optional public sidecar. Opening reverses every
//! step, binding all checks to the envelope itself rather than to
//! caller-supplied values.
//!
//! Both operations are synchronous pure functions: no shared state, no
//! retained key material, and nothing observable left behind on failure.

use crate::aad::{build_aad, parse_aad, validate_namespace};
use crate::canonical::canonical_json_bytes;
use crate::errors::{HpkeError, Result};
use crate::headers::{HeaderEntry, HeaderRegistry};
use crate::kem::{self, AEAD_NAME, KDF_NAME, KEM_NAME, SUITE_NAME};
use crate::keys::Jwk;
use crate::sidecar::{self, Sidecar, Visibility};
use crate::transport::Transport;
use crate::utils::{b64url_decode, b64url_decode_32, b64url_encode};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Value of the envelope `typ` field.
pub const ENVELOPE_TYPE: &str = "hpke-envelope";

/// Value of the envelope `ver` field.
pub const ENVELOPE_VERSION: &str = "1";

/// Provisional media type for the envelope wire format.
pub const ENVELOPE_MEDIA_TYPE: &str = "application/x402-envelope+json";

/// The self-describing envelope record.
///
/// Immutable once emitted; every algorithm choice is declared inline so a
/// recipient needs nothing beyond this record and its private key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Record type; always `"hpke-envelope"`
    pub typ: String,

    /// Envelope format version; always `"1"`
    pub ver: String,

    /// Cipher suite identifier
    pub suite: String,

    /// Application namespace bound into AAD and key derivation
    pub ns: String,

    /// Recipient key id the sealer encrypted to
    pub kid: String,

    /// KEM name; always `"X25519"`
    pub kem: String,

    /// KDF name; always `"HKDF-SHA256"`
    pub kdf: String,

    /// AEAD name; always `"CHACHA20-POLY1305"` in v1
    pub aead: String,

    /// Ephemeral public key, base64url without padding (32 bytes)
    pub enc: String,

    /// Canonical AAD bytes, base64url without padding
    pub aad: String,

    /// Ciphertext with appended tag, base64url without padding
    pub ct: String,
}

impl Envelope {
    /// Serializes the envelope to its JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| HpkeError::InvalidEnvelope(format!("envelope serialization: {}", e)))
    }

    /// Parses an envelope from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| HpkeError::InvalidEnvelope(format!("envelope parse: {}", e)))
    }
}

/// Inputs to [`seal`].
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use x402_hpke::envelope::{open, seal, OpenRequest, SealRequest};
/// use x402_hpke::keys::KeyPair;
/// use x402_hpke::transport::Transport;
///
/// let pair = KeyPair::generate(Some("key-1"));
/// let transport = Transport::other_request(json!({"action": "test"})).unwrap();
///
/// let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), transport)).unwrap();
/// assert!(sealed.sidecar.is_none());
///
/// let opened = open(&OpenRequest::new("myapp", pair.private.clone(), sealed.envelope)).unwrap();
/// assert_eq!(opened.plaintext, br#"{"action":"test"}"#);
/// ```
#[derive(Debug, Clone)]
pub struct SealRequest {
    /// Application namespace
    pub ns: String,

    /// Recipient key id recorded in the envelope
    pub kid: String,

    /// Recipient public JWK
    pub recipient: Jwk,

    /// The validated semantic message to seal
    pub transport: Transport,

    /// Which entities to project publicly; absent means fully private
    pub visibility: Option<Visibility>,

    /// Names/keys withheld from the projection
    pub private_entities: Vec<String>,

    /// Approved extension header registry
    pub registry: HeaderRegistry,

    /// AEAD name; only `"CHACHA20-POLY1305"` is accepted in v1
    pub aead: String,

    /// Deterministic ephemeral seed for known-answer tests
    pub ephemeral_seed: Option<[u8; 32]>,
}

impl SealRequest {
    /// Creates a seal request with default registry, the v1 AEAD, and no
    /// public projection.
    pub fn new(
        ns: impl Into<String>,
        kid: impl Into<String>,
        recipient: Jwk,
        transport: Transport,
    ) -> Self {
        Self {
            ns: ns.into(),
            kid: kid.into(),
            recipient,
            transport,
            visibility: None,
            private_entities: Vec::new(),
            registry: HeaderRegistry::default(),
            aead: AEAD_NAME.to_string(),
            ephemeral_seed: None,
        }
    }

    /// Selects entities to make public alongside the envelope.
    pub fn with_public(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Withholds specific entities from the public projection.
    pub fn with_private(mut self, names: Vec<String>) -> Self {
        self.private_entities = names;
        self
    }

    /// Uses a custom approved-extension registry.
    pub fn with_registry(mut self, registry: HeaderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Overrides the AEAD name. Anything other than the v1 suite AEAD is
    /// rejected by [`seal`].
    pub fn with_aead(mut self, aead: impl Into<String>) -> Self {
        self.aead = aead.into();
        self
    }

    /// Derives the ephemeral key pair from a fixed seed. Known-answer tests
    /// only; production seals generate a fresh ephemeral per call.
    pub fn with_ephemeral_seed(mut self, seed: [u8; 32]) -> Self {
        self.ephemeral_seed = Some(seed);
        self
    }
}

/// Output of [`seal`].
#[derive(Debug, Clone)]
pub struct Sealed {
    /// The envelope record to transmit
    pub envelope: Envelope,

    /// The public projection, when a non-empty selection was requested
    pub sidecar: Option<Sidecar>,
}

/// Inputs to [`open`].
#[derive(Debug, Clone)]
pub struct OpenRequest {
    /// Caller-configured namespace; must match the envelope
    pub ns: String,

    /// Recipient private JWK
    pub recipient: Jwk,

    /// The envelope to open
    pub envelope: Envelope,

    /// When set, the envelope `kid` must match exactly
    pub expected_kid: Option<String>,

    /// Caller-configured AEAD; must match the envelope
    pub aead: String,

    /// Sidecar headers (string form) to verify against the AAD
    pub public_headers: Option<BTreeMap<String, String>>,

    /// Sidecar headers (JSON form) to verify against the AAD
    pub public_json: Option<Map<String, Value>>,

    /// Sidecar body subset to verify against the AAD
    pub public_body: Option<Map<String, Value>>,
}

impl OpenRequest {
    /// Creates an open request with no kid pin and no sidecar inputs.
    pub fn new(ns: impl Into<String>, recipient: Jwk, envelope: Envelope) -> Self {
        Self {
            ns: ns.into(),
            recipient,
            envelope,
            expected_kid: None,
            aead: AEAD_NAME.to_string(),
            public_headers: None,
            public_json: None,
            public_body: None,
        }
    }

    /// Requires the envelope to name this recipient key id.
    pub fn with_expected_kid(mut self, kid: impl Into<String>) -> Self {
        self.expected_kid = Some(kid.into());
        self
    }

    /// Supplies sidecar headers (string form) for verification.
    pub fn with_public_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.public_headers = Some(headers);
        self
    }

    /// Supplies sidecar headers (JSON form) for verification.
    pub fn with_public_json(mut self, headers: Map<String, Value>) -> Self {
        self.public_json = Some(headers);
        self
    }

    /// Supplies a sidecar body subset for verification.
    pub fn with_public_body(mut self, body: Map<String, Value>) -> Self {
        self.public_body = Some(body);
        self
    }
}

/// Output of [`open`].
#[derive(Debug, Clone)]
pub struct Opened {
    /// Decrypted plaintext: the canonical body JSON bytes
    pub plaintext: Vec<u8>,

    /// Body object parsed from the authenticated AAD
    pub body: Map<String, Value>,

    /// Headers parsed from the authenticated AAD
    pub headers: Vec<HeaderEntry>,
}

/// Seals a transport into an envelope for the recipient key.
///
/// The plaintext is the canonical JSON of the normalized body, so
/// header-carrying transports (PAYMENT, PAYMENT_RESPONSE) encrypt `"{}"`;
/// their content travels in the authenticated headers instead. Replay
/// prevention is not built in: applications that need it bind a unique id
/// or expiry into the content so it is covered by the AAD.
pub fn seal(request: &SealRequest) -> Result<Sealed> {
    if request.aead != AEAD_NAME {
        return Err(HpkeError::AeadUnsupported(request.aead.clone()));
    }
    validate_namespace(&request.ns)?;

    let normalized = request.transport.normalize(&request.registry)?;
    let mut headers: Vec<HeaderEntry> = Vec::new();
    if let Some(core) = &normalized.header_core {
        headers.push(core.clone());
    }
    headers.extend(normalized.extensions.iter().cloned());

    let bundle = build_aad(&request.ns, &headers, &normalized.body, &request.registry)?;
    let plaintext = canonical_json_bytes(&Value::Object(bundle.body_normalized.clone()));

    let recipient_pk = request.recipient.public_key_bytes()?;
    let encapsulated = kem::encapsulate(
        &recipient_pk,
        &request.ns,
        request.ephemeral_seed.as_ref(),
    )?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&*encapsulated.keys.key));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&*encapsulated.keys.nonce),
            Payload {
                msg: &plaintext,
                aad: &bundle.bytes,
            },
        )
        .map_err(|_| HpkeError::InvalidEnvelope("AEAD encryption failed".to_string()))?;

    let envelope = Envelope {
        typ: ENVELOPE_TYPE.to_string(),
        ver: ENVELOPE_VERSION.to_string(),
        suite: SUITE_NAME.to_string(),
        ns: request.ns.clone(),
        kid: request.kid.clone(),
        kem: KEM_NAME.to_string(),
        kdf: KDF_NAME.to_string(),
        aead: AEAD_NAME.to_string(),
        enc: b64url_encode(encapsulated.enc),
        aad: b64url_encode(&bundle.bytes),
        ct: b64url_encode(&ciphertext),
    };

    let sidecar = sidecar::project(
        &bundle.headers_normalized,
        &bundle.body_normalized,
        normalized.effective_http_response_code,
        request.visibility.as_ref(),
        &request.private_entities,
    );

    Ok(Sealed { envelope, sidecar })
}

/// Opens an envelope, authenticating ciphertext and AAD together.
///
/// All checks bind to the envelope record: the namespace and `enc` used for
/// key derivation come from the envelope, and the caller's configured
/// namespace is only compared against it. Tag failures surface as the
/// generic invalid-envelope kind so authentication errors are not a
/// distinguishable oracle.
pub fn open(request: &OpenRequest) -> Result<Opened> {
    let envelope = &request.envelope;

    if envelope.typ != ENVELOPE_TYPE {
        return Err(HpkeError::InvalidEnvelope(format!(
            "unexpected typ '{}'",
            envelope.typ
        )));
    }
    if envelope.ver != ENVELOPE_VERSION {
        return Err(HpkeError::InvalidEnvelope(format!(
            "unsupported version '{}'",
            envelope.ver
        )));
    }
    validate_namespace(&envelope.ns)?;

    if envelope.aead != AEAD_NAME || request.aead != envelope.aead {
        return Err(HpkeError::AeadMismatch {
            expected: request.aead.clone(),
            actual: envelope.aead.clone(),
        });
    }
    if let Some(expected) = &request.expected_kid {
        if expected != &envelope.kid {
            return Err(HpkeError::KidMismatch {
                expected: expected.clone(),
                actual: envelope.kid.clone(),
            });
        }
    }
    if request.ns != envelope.ns {
        return Err(HpkeError::NsMismatch {
            expected: request.ns.clone(),
            actual: envelope.ns.clone(),
        });
    }

    let enc = b64url_decode_32(&envelope.enc)?;
    let aad_bytes = b64url_decode(&envelope.aad)?;
    let ciphertext = b64url_decode(&envelope.ct)?;

    let recipient_sk = request.recipient.private_key_bytes()?;
    let keys = kem::decapsulate(&enc, &recipient_sk, &envelope.ns)?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&*keys.key));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&*keys.nonce),
            Payload {
                msg: &ciphertext,
                aad: &aad_bytes,
            },
        )
        .map_err(|_| HpkeError::InvalidEnvelope("envelope rejected".to_string()))?;

    let (headers, body) = parse_aad(&aad_bytes, &envelope.ns)?;

    sidecar::verify(
        &headers,
        &body,
        request.public_headers.as_ref(),
        request.public_json.as_ref(),
        request.public_body.as_ref(),
    )?;

    Ok(Opened {
        plaintext,
        body,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use serde_json::json;

    fn pair() -> KeyPair {
        KeyPair::generate(Some("key-1"))
    }

    fn other_request() -> Transport {
        Transport::other_request(json!({"action": "test"})).unwrap()
    }

    #[test]
    fn test_roundtrip_other_request() {
        let pair = pair();
        let sealed = seal(&SealRequest::new(
            "myapp",
            "key-1",
            pair.public.clone(),
            other_request(),
        ))
        .unwrap();

        assert_eq!(sealed.envelope.typ, "hpke-envelope");
        assert_eq!(sealed.envelope.ver, "1");
        assert_eq!(sealed.envelope.suite, "X25519-HKDF-SHA256-CHACHA20POLY1305");
        assert_eq!(sealed.envelope.aead, "CHACHA20-POLY1305");
        assert!(sealed.sidecar.is_none());

        let opened = open(&OpenRequest::new(
            "myapp",
            pair.private.clone(),
            sealed.envelope,
        ))
        .unwrap();
        assert_eq!(opened.plaintext, br#"{"action":"test"}"#.to_vec());
        assert_eq!(opened.body, json!({"action": "test"}).as_object().unwrap().clone());
        assert!(opened.headers.is_empty());
    }

    #[test]
    fn test_roundtrip_payment_encrypts_empty_body() {
        let pair = pair();
        let transport = Transport::payment(json!({"payload": {"invoiceId": "inv_1"}})).unwrap();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), transport)).unwrap();

        let opened = open(&OpenRequest::new("myapp", pair.private.clone(), sealed.envelope)).unwrap();
        assert_eq!(opened.plaintext, b"{}".to_vec());
        assert_eq!(opened.headers.len(), 1);
        assert_eq!(opened.headers[0].name, "X-Payment");
        assert_eq!(opened.headers[0].value, json!({"payload": {"invoiceId": "inv_1"}}));
    }

    #[test]
    fn test_roundtrip_payment_required_moves_content_to_body() {
        let pair = pair();
        let transport = Transport::payment_required(json!({"need": true}), None).unwrap();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), transport)).unwrap();

        let opened = open(&OpenRequest::new("myapp", pair.private.clone(), sealed.envelope)).unwrap();
        assert_eq!(opened.plaintext, br#"{"need":true}"#.to_vec());
        assert!(opened.headers.is_empty());
    }

    #[test]
    fn test_seal_rejects_unsupported_aead() {
        let pair = pair();
        let request = SealRequest::new("myapp", "key-1", pair.public, other_request())
            .with_aead("AES-256-GCM");
        let err = seal(&request).unwrap_err();
        assert_eq!(err.code(), "AEAD_UNSUPPORTED");
    }

    #[test]
    fn test_seal_and_open_reject_reserved_namespace() {
        let pair = pair();
        let err = seal(&SealRequest::new("x402", "key-1", pair.public.clone(), other_request()))
            .unwrap_err();
        assert_eq!(err.code(), "NS_FORBIDDEN");

        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();
        let mut envelope = sealed.envelope;
        envelope.ns = "X402".to_string();
        let err = open(&OpenRequest::new("X402", pair.private, envelope)).unwrap_err();
        assert_eq!(err.code(), "NS_FORBIDDEN");
    }

    #[test]
    fn test_open_rejects_wrong_version_and_typ() {
        let pair = pair();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();

        let mut envelope = sealed.envelope.clone();
        envelope.ver = "2".to_string();
        let err = open(&OpenRequest::new("myapp", pair.private.clone(), envelope)).unwrap_err();
        assert_eq!(err.code(), "INVALID_ENVELOPE");

        let mut envelope = sealed.envelope;
        envelope.typ = "jwe".to_string();
        let err = open(&OpenRequest::new("myapp", pair.private, envelope)).unwrap_err();
        assert_eq!(err.code(), "INVALID_ENVELOPE");
    }

    #[test]
    fn test_open_rejects_aead_mismatch() {
        let pair = pair();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();

        let mut envelope = sealed.envelope;
        envelope.aead = "AES-256-GCM".to_string();
        let err = open(&OpenRequest::new("myapp", pair.private, envelope)).unwrap_err();
        assert_eq!(err.code(), "AEAD_MISMATCH");
    }

    #[test]
    fn test_open_rejects_kid_mismatch() {
        let pair = pair();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();

        let request = OpenRequest::new("myapp", pair.private, sealed.envelope)
            .with_expected_kid("key-2");
        let err = open(&request).unwrap_err();
        assert_eq!(err.code(), "KID_MISMATCH");
    }

    #[test]
    fn test_open_rejects_ns_mismatch() {
        let pair = pair();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();

        let err = open(&OpenRequest::new("otherapp", pair.private, sealed.envelope)).unwrap_err();
        assert_eq!(err.code(), "NS_MISMATCH");
    }

    #[test]
    fn test_open_rejects_all_zero_enc() {
        let pair = pair();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();

        let mut envelope = sealed.envelope;
        envelope.enc = b64url_encode([0u8; 32]);
        let err = open(&OpenRequest::new("myapp", pair.private, envelope)).unwrap_err();
        assert_eq!(err.code(), "ECDH_LOW_ORDER");
    }

    #[test]
    fn test_open_rejects_tampered_ciphertext() {
        let pair = pair();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();

        let mut ct = b64url_decode(&sealed.envelope.ct).unwrap();
        ct[0] ^= 1;
        let mut envelope = sealed.envelope;
        envelope.ct = b64url_encode(&ct);

        let err = open(&OpenRequest::new("myapp", pair.private, envelope)).unwrap_err();
        assert_eq!(err.code(), "INVALID_ENVELOPE");
    }

    #[test]
    fn test_open_rejects_tampered_aad() {
        let pair = pair();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();

        let mut aad = b64url_decode(&sealed.envelope.aad).unwrap();
        let last = aad.len() - 1;
        aad[last] ^= 1;
        let mut envelope = sealed.envelope;
        envelope.aad = b64url_encode(&aad);

        let err = open(&OpenRequest::new("myapp", pair.private, envelope)).unwrap_err();
        assert_eq!(err.code(), "INVALID_ENVELOPE");
    }

    #[test]
    fn test_open_rejects_swapped_enc() {
        let pair = pair();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();

        // A different valid ephemeral key still fails authentication.
        let other = KeyPair::generate(None);
        let mut envelope = sealed.envelope;
        envelope.enc = other.public.x.clone();

        let err = open(&OpenRequest::new("myapp", pair.private, envelope)).unwrap_err();
        assert_eq!(err.code(), "INVALID_ENVELOPE");
    }

    #[test]
    fn test_seeded_seal_is_deterministic() {
        let recipient = KeyPair::from_seed(&[1u8; 32], Some("key-1"));
        let seed = [2u8; 32];

        let a = seal(
            &SealRequest::new("myapp", "key-1", recipient.public.clone(), other_request())
                .with_ephemeral_seed(seed),
        )
        .unwrap();
        let b = seal(
            &SealRequest::new("myapp", "key-1", recipient.public.clone(), other_request())
                .with_ephemeral_seed(seed),
        )
        .unwrap();

        assert_eq!(a.envelope, b.envelope);
    }

    #[test]
    fn test_sidecar_projection_and_verification() {
        let pair = pair();
        let transport = Transport::payment(json!({"payload": {"invoiceId": "inv_1"}})).unwrap();
        let sealed = seal(
            &SealRequest::new("myapp", "key-1", pair.public.clone(), transport)
                .with_public(Visibility::Names(vec!["X-PAYMENT".to_string()])),
        )
        .unwrap();

        let sidecar = sealed.sidecar.unwrap();
        let public_headers = sidecar.public_headers.clone().unwrap();
        assert_eq!(
            public_headers["X-PAYMENT"],
            r#"{"payload":{"invoiceId":"inv_1"}}"#
        );

        let request = OpenRequest::new("myapp", pair.private.clone(), sealed.envelope.clone())
            .with_public_headers(public_headers.clone());
        open(&request).unwrap();

        // Tampering the sidecar string must fail verification.
        let mut tampered = public_headers;
        tampered.insert(
            "X-PAYMENT".to_string(),
            r#"{"payload":{"invoiceId":"inv_2"}}"#.to_string(),
        );
        let request = OpenRequest::new("myapp", pair.private, sealed.envelope)
            .with_public_headers(tampered);
        let err = open(&request).unwrap_err();
        assert_eq!(err.code(), "AAD_MISMATCH");
    }

    #[test]
    fn test_402_sidecar_has_body_only() {
        let pair = pair();
        let transport = Transport::payment_required(json!({"need": true}), None).unwrap();
        let sealed = seal(
            &SealRequest::new("myapp", "key-1", pair.public.clone(), transport)
                .with_public(Visibility::All),
        )
        .unwrap();

        let sidecar = sealed.sidecar.unwrap();
        assert!(sidecar.public_headers.is_none());
        let public_body = sidecar.public_body.clone().unwrap();
        assert_eq!(public_body["need"], json!(true));

        let request = OpenRequest::new("myapp", pair.private, sealed.envelope)
            .with_public_body(public_body);
        let opened = open(&request).unwrap();
        assert_eq!(opened.body["need"], json!(true));
    }

    #[test]
    fn test_envelope_json_roundtrip() {
        let pair = pair();
        let sealed = seal(&SealRequest::new("myapp", "key-1", pair.public.clone(), other_request()))
            .unwrap();

        let json = sealed.envelope.to_json().unwrap();
        let parsed = Envelope::from_json(&json).unwrap();
        assert_eq!(parsed, sealed.envelope);

        let opened = open(&OpenRequest::new("myapp", pair.private, parsed)).unwrap();
        assert_eq!(opened.plaintext, br#"{"action":"test"}"#.to_vec());
    }
}
