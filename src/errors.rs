//! Error types for the x402-hpke library.
//!
//! Every rejection the codec can produce maps to exactly one variant here,
//! and every variant carries a stable machine-readable code for integrators
//! that route on error kinds rather than display strings.

use std::borrow::Cow;
use thiserror::Error;

/// Main error type for x402-hpke operations.
///
/// The taxonomy is closed: the codec never surfaces a foreign error type
/// directly. External failures (JSON parsing, base64 decoding, HTTP
/// transport) are converted into the matching variant at the boundary.
/// AEAD authentication failures surface as [`HpkeError::InvalidEnvelope`]
/// so that tag mismatches are indistinguishable from other malformed
/// envelopes.
#[derive(Error, Debug)]
pub enum HpkeError {
    /// The namespace is empty or uses the reserved `"x402"` value
    #[error("Namespace is empty or reserved")]
    NsForbidden,

    /// The caller-configured namespace differs from the envelope namespace
    #[error("Namespace mismatch: expected '{expected}', envelope has '{actual}'")]
    NsMismatch {
        /// Namespace the caller was configured with
        expected: String,
        /// Namespace declared by the envelope
        actual: String,
    },

    /// No JWKS URL was provided
    #[error("JWKS URL is required")]
    JwksUrlRequired,

    /// The JWKS URL does not use the https scheme
    #[error("JWKS URL must use https")]
    JwksHttpsRequired,

    /// The JWKS endpoint returned a non-success HTTP status
    #[error("JWKS fetch failed with HTTP status {0}")]
    JwksHttp(u16),

    /// The JWKS document could not be fetched or parsed
    #[error("Invalid JWKS: {0}")]
    JwksInvalid(String),

    /// A key inside the JWKS is not a valid X25519 OKP JWK
    #[error("Invalid JWKS key: {0}")]
    JwksKeyInvalid(String),

    /// A key declares a `use` other than `"enc"`
    #[error("JWKS key '{0}' is not an encryption key")]
    JwksKeyUseInvalid(String),

    /// The requested key id is empty
    #[error("JWKS kid must be a non-empty string")]
    JwksKidInvalid,

    /// OTHER_REQUEST transports must not carry an HTTP status code
    #[error("OTHER_REQUEST must not set an HTTP response code")]
    OtherRequestHttpCode,

    /// OTHER_RESPONSE transports must not use status 402
    #[error("OTHER_RESPONSE must not use HTTP status 402")]
    OtherResponse402,

    /// PAYMENT_REQUIRED transports need non-empty content
    #[error("PAYMENT_REQUIRED requires non-empty content")]
    PaymentRequiredContent,

    /// PAYMENT_RESPONSE transports need non-empty content
    #[error("PAYMENT_RESPONSE requires non-empty content")]
    PaymentResponseContent,

    /// PAYMENT_RESPONSE transports only accept status 200
    #[error("PAYMENT_RESPONSE accepts only HTTP status 200, got {0}")]
    PaymentResponseHttpCode(u16),

    /// PAYMENT transports must not carry an HTTP status code
    #[error("PAYMENT must not set an HTTP response code")]
    PaymentHttpCode,

    /// PAYMENT transports must contain a `payload` key
    #[error("PAYMENT content requires a 'payload' key")]
    PaymentPayload,

    /// Transport content must be a JSON object
    #[error("Transport content must be a JSON object")]
    ContentObject,

    /// An extension header name is not in the approved registry
    #[error("Extension header '{0}' is not approved")]
    ExtensionUnapproved(String),

    /// The same extension header appears more than once
    #[error("Duplicate extension header '{0}'")]
    ExtensionDuplicate(String),

    /// An extension header payload is not a JSON object
    #[error("Extension header '{0}' payload must be a JSON object")]
    ExtensionPayload(String),

    /// A top-level body key collides with a header name
    #[error("Body key '{0}' collides with a header name")]
    BodyHeaderNameCollision(String),

    /// More than one core x402 header in a single message
    #[error("A message may carry at most one core x402 header")]
    MultipleCoreHeaders,

    /// All-zero public key or contributory-ECDH failure
    #[error("X25519 key exchange produced a low-order result")]
    EcdhLowOrder,

    /// The requested AEAD is not supported by this suite version
    #[error("Unsupported AEAD: {0}")]
    AeadUnsupported(String),

    /// The envelope declares a different AEAD than the caller expects
    #[error("AEAD mismatch: expected '{expected}', envelope has '{actual}'")]
    AeadMismatch {
        /// AEAD name the caller was configured with
        expected: String,
        /// AEAD name declared by the envelope
        actual: String,
    },

    /// The envelope is malformed or fails authentication
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The envelope kid differs from the expected kid
    #[error("Kid mismatch: expected '{expected}', envelope has '{actual}'")]
    KidMismatch {
        /// Kid the caller expected
        expected: String,
        /// Kid declared by the envelope
        actual: String,
    },

    /// A streaming limit would be exceeded
    #[error("Stream limit exceeded: {0}")]
    AeadLimit(String),

    /// The streaming nonce prefix is not 16 bytes
    #[error("Stream nonce prefix must be 16 bytes, got {0}")]
    StreamNoncePrefixLen(usize),

    /// A supplied public value differs from the authenticated copy
    #[error("Public value for '{0}' does not match AAD")]
    AadMismatch(String),

    /// A supplied public name/key is not present in the AAD
    #[error("Public entity '{0}' is not present in AAD")]
    PublicKeyNotInAad(String),
}

impl HpkeError {
    /// Returns the stable machine-readable code for this error kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_hpke::errors::HpkeError;
    ///
    /// assert_eq!(HpkeError::NsForbidden.code(), "NS_FORBIDDEN");
    /// assert_eq!(HpkeError::JwksHttp(503).code(), "JWKS_HTTP_503");
    /// ```
    pub fn code(&self) -> Cow<'static, str> {
        match self {
            Self::NsForbidden => Cow::Borrowed("NS_FORBIDDEN"),
            Self::NsMismatch { .. } => Cow::Borrowed("NS_MISMATCH"),
            Self::JwksUrlRequired => Cow::Borrowed("JWKS_URL_REQUIRED"),
            Self::JwksHttpsRequired => Cow::Borrowed("JWKS_HTTPS_REQUIRED"),
            Self::JwksHttp(status) => Cow::Owned(format!("JWKS_HTTP_{}", status)),
            Self::JwksInvalid(_) => Cow::Borrowed("JWKS_INVALID"),
            Self::JwksKeyInvalid(_) => Cow::Borrowed("JWKS_KEY_INVALID"),
            Self::JwksKeyUseInvalid(_) => Cow::Borrowed("JWKS_KEY_USE_INVALID"),
            Self::JwksKidInvalid => Cow::Borrowed("JWKS_KID_INVALID"),
            Self::OtherRequestHttpCode => Cow::Borrowed("OTHER_REQUEST_HTTP_CODE"),
            Self::OtherResponse402 => Cow::Borrowed("OTHER_RESPONSE_402"),
            Self::PaymentRequiredContent => Cow::Borrowed("PAYMENT_REQUIRED_CONTENT"),
            Self::PaymentResponseContent => Cow::Borrowed("PAYMENT_RESPONSE_CONTENT"),
            Self::PaymentResponseHttpCode(_) => Cow::Borrowed("PAYMENT_RESPONSE_HTTP_CODE"),
            Self::PaymentHttpCode => Cow::Borrowed("PAYMENT_HTTP_CODE"),
            Self::PaymentPayload => Cow::Borrowed("PAYMENT_PAYLOAD"),
            Self::ContentObject => Cow::Borrowed("CONTENT_OBJECT"),
            Self::ExtensionUnapproved(_) => Cow::Borrowed("X402_EXTENSION_UNAPPROVED"),
            Self::ExtensionDuplicate(_) => Cow::Borrowed("X402_EXTENSION_DUPLICATE"),
            Self::ExtensionPayload(_) => Cow::Borrowed("X402_EXTENSION_PAYLOAD"),
            Self::BodyHeaderNameCollision(_) => Cow::Borrowed("BODY_HEADER_NAME_COLLISION"),
            Self::MultipleCoreHeaders => Cow::Borrowed("MULTIPLE_CORE_X402_HEADERS"),
            Self::EcdhLowOrder => Cow::Borrowed("ECDH_LOW_ORDER"),
            Self::AeadUnsupported(_) => Cow::Borrowed("AEAD_UNSUPPORTED"),
            Self::AeadMismatch { .. } => Cow::Borrowed("AEAD_MISMATCH"),
            Self::InvalidEnvelope(_) => Cow::Borrowed("INVALID_ENVELOPE"),
            Self::KidMismatch { .. } => Cow::Borrowed("KID_MISMATCH"),
            Self::AeadLimit(_) => Cow::Borrowed("AEAD_LIMIT"),
            Self::StreamNoncePrefixLen(_) => Cow::Borrowed("STREAM_NONCE_PREFIX_LEN"),
            Self::AadMismatch(_) => Cow::Borrowed("AAD_MISMATCH"),
            Self::PublicKeyNotInAad(_) => Cow::Borrowed("PUBLIC_KEY_NOT_IN_AAD"),
        }
    }
}

/// Result type alias for x402-hpke operations.
pub type Result<T> = std::result::Result<T, HpkeError>;
