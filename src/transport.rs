//! Transport model for the x402-hpke codec.
//!
//! A transport is the validated semantic message the codec seals: a type,
//! JSON-object content, an optional HTTP status code, and optional approved
//! extension headers. Each semantic type is a distinct enum variant carrying
//! only the fields that are valid for it, and [`Transport::normalize`]
//! applies the per-type validation table to produce the header/body split
//! that the AAD builder consumes.

use crate::errors::{HpkeError, Result};
use crate::headers::{HeaderEntry, HeaderRegistry, HEADER_PAYMENT, HEADER_PAYMENT_RESPONSE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Semantic message type tags, matching the wire-level spelling.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportType {
    /// A payment authorization carried in the `X-Payment` header
    Payment,
    /// A payment settlement result carried in the `X-Payment-Response` header
    PaymentResponse,
    /// A 402 Payment Required body
    PaymentRequired,
    /// Any non-payment request body
    OtherRequest,
    /// Any non-payment response body
    OtherResponse,
}

/// An approved extension header attached to a transport.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Extension {
    /// Extension header name; must match the approved registry
    pub name: String,

    /// Extension payload; must be a JSON object
    pub value: Value,
}

impl Extension {
    /// Creates a new extension entry.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A validated semantic message ready for sealing.
///
/// Construct through the typed constructors ([`Transport::payment`],
/// [`Transport::other_request`], ...) or dynamically through
/// [`Transport::from_parts`]. Validation that depends on the approved
/// extension registry happens in [`Transport::normalize`].
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use x402_hpke::transport::Transport;
///
/// let transport = Transport::payment(json!({"payload": {"invoiceId": "inv_1"}})).unwrap();
/// let normalized = transport.normalize(&Default::default()).unwrap();
/// assert_eq!(normalized.header_core.unwrap().name, "X-Payment");
/// assert!(normalized.body.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Transport {
    /// Payment authorization; content must contain a `payload` key.
    Payment {
        /// Message content, moved into the `X-Payment` header value
        content: Map<String, Value>,
        /// Approved extension headers
        extensions: Vec<Extension>,
    },
    /// Payment settlement result; status is always coerced to 200.
    PaymentResponse {
        /// Message content, moved into the `X-Payment-Response` header value
        content: Map<String, Value>,
        /// Optional status; only 200 is accepted
        http_response_code: Option<u16>,
        /// Approved extension headers
        extensions: Vec<Extension>,
    },
    /// 402 Payment Required; content becomes the body.
    PaymentRequired {
        /// Message content, kept as the body
        content: Map<String, Value>,
        /// Optional status; anything other than 402 is coerced with a warning
        http_response_code: Option<u16>,
        /// Approved extension headers
        extensions: Vec<Extension>,
    },
    /// Non-payment request; content becomes the body.
    OtherRequest {
        /// Message content, kept as the body
        content: Map<String, Value>,
        /// Approved extension headers
        extensions: Vec<Extension>,
    },
    /// Non-payment response; content becomes the body.
    OtherResponse {
        /// Message content, kept as the body
        content: Map<String, Value>,
        /// Response status; must not be 402
        http_response_code: u16,
        /// Approved extension headers
        extensions: Vec<Extension>,
    },
}

/// Output of [`Transport::normalize`]: the header/body split handed to the
/// AAD builder.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTransport {
    /// The core x402 header, when the type produces one
    pub header_core: Option<HeaderEntry>,

    /// The body object (empty for header-carrying types)
    pub body: Map<String, Value>,

    /// Extension headers in canonical casing
    pub extensions: Vec<HeaderEntry>,

    /// The effective HTTP status after coercion rules
    pub effective_http_response_code: Option<u16>,
}

fn require_object(content: Value) -> Result<Map<String, Value>> {
    match content {
        Value::Object(map) => Ok(map),
        _ => Err(HpkeError::ContentObject),
    }
}

impl Transport {
    /// Creates a PAYMENT transport. The content must be a JSON object
    /// containing a `payload` key (checked at normalization).
    pub fn payment(content: Value) -> Result<Self> {
        Ok(Self::Payment {
            content: require_object(content)?,
            extensions: Vec::new(),
        })
    }

    /// Creates a PAYMENT_RESPONSE transport.
    pub fn payment_response(content: Value, http_response_code: Option<u16>) -> Result<Self> {
        Ok(Self::PaymentResponse {
            content: require_object(content)?,
            http_response_code,
            extensions: Vec::new(),
        })
    }

    /// Creates a PAYMENT_REQUIRED transport.
    pub fn payment_required(content: Value, http_response_code: Option<u16>) -> Result<Self> {
        Ok(Self::PaymentRequired {
            content: require_object(content)?,
            http_response_code,
            extensions: Vec::new(),
        })
    }

    /// Creates an OTHER_REQUEST transport.
    pub fn other_request(content: Value) -> Result<Self> {
        Ok(Self::OtherRequest {
            content: require_object(content)?,
            extensions: Vec::new(),
        })
    }

    /// Creates an OTHER_RESPONSE transport with its required status code.
    pub fn other_response(content: Value, http_response_code: u16) -> Result<Self> {
        Ok(Self::OtherResponse {
            content: require_object(content)?,
            http_response_code,
            extensions: Vec::new(),
        })
    }

    /// Builds a transport from dynamic parts, for callers that receive the
    /// type tag and status code at runtime (e.g. deserialized requests).
    ///
    /// This is where status-presence rules that the typed variants enforce
    /// structurally are checked for dynamic input: a status on
    /// OTHER_REQUEST or PAYMENT is rejected, and a missing status on
    /// OTHER_RESPONSE is rejected under the same kind as the 402 collision.
    pub fn from_parts(
        transport_type: TransportType,
        content: Value,
        http_response_code: Option<u16>,
        extensions: Vec<Extension>,
    ) -> Result<Self> {
        let transport = match transport_type {
            TransportType::Payment => {
                if http_response_code.is_some() {
                    return Err(HpkeError::PaymentHttpCode);
                }
                let mut t = Self::payment(content)?;
                t.extensions_mut().extend(extensions);
                t
            }
            TransportType::PaymentResponse => {
                let mut t = Self::payment_response(content, http_response_code)?;
                t.extensions_mut().extend(extensions);
                t
            }
            TransportType::PaymentRequired => {
                let mut t = Self::payment_required(content, http_response_code)?;
                t.extensions_mut().extend(extensions);
                t
            }
            TransportType::OtherRequest => {
                if http_response_code.is_some() {
                    return Err(HpkeError::OtherRequestHttpCode);
                }
                let mut t = Self::other_request(content)?;
                t.extensions_mut().extend(extensions);
                t
            }
            TransportType::OtherResponse => {
                let code = http_response_code.ok_or(HpkeError::OtherResponse402)?;
                let mut t = Self::other_response(content, code)?;
                t.extensions_mut().extend(extensions);
                t
            }
        };
        Ok(transport)
    }

    /// Attaches an extension header.
    pub fn with_extension(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extensions_mut().push(Extension::new(name, value));
        self
    }

    /// Returns this transport's type tag.
    pub fn transport_type(&self) -> TransportType {
        match self {
            Self::Payment { .. } => TransportType::Payment,
            Self::PaymentResponse { .. } => TransportType::PaymentResponse,
            Self::PaymentRequired { .. } => TransportType::PaymentRequired,
            Self::OtherRequest { .. } => TransportType::OtherRequest,
            Self::OtherResponse { .. } => TransportType::OtherResponse,
        }
    }

    fn extensions_mut(&mut self) -> &mut Vec<Extension> {
        match self {
            Self::Payment { extensions, .. }
            | Self::PaymentResponse { extensions, .. }
            | Self::PaymentRequired { extensions, .. }
            | Self::OtherRequest { extensions, .. }
            | Self::OtherResponse { extensions, .. } => extensions,
        }
    }

    fn extensions(&self) -> &[Extension] {
        match self {
            Self::Payment { extensions, .. }
            | Self::PaymentResponse { extensions, .. }
            | Self::PaymentRequired { extensions, .. }
            | Self::OtherRequest { extensions, .. }
            | Self::OtherResponse { extensions, .. } => extensions,
        }
    }

    /// Validates this transport against the per-type rules and produces the
    /// normalized header/body split.
    ///
    /// | Type | Status rule | Header core | Body |
    /// |---|---|---|---|
    /// | OTHER_REQUEST | none | none | content |
    /// | OTHER_RESPONSE | required, not 402 | none | content |
    /// | PAYMENT_REQUIRED | absent or 402; others coerced to 402 | none | content |
    /// | PAYMENT_RESPONSE | absent or 200; coerced to 200 | `X-Payment-Response` | `{}` |
    /// | PAYMENT | none | `X-Payment` | `{}` |
    pub fn normalize(&self, registry: &HeaderRegistry) -> Result<NormalizedTransport> {
        let (header_core, body, effective_http_response_code) = match self {
            Self::Payment { content, .. } => {
                if !content.contains_key("payload") {
                    return Err(HpkeError::PaymentPayload);
                }
                let header = HeaderEntry::new(HEADER_PAYMENT, Value::Object(content.clone()));
                (Some(header), Map::new(), None)
            }
            Self::PaymentResponse {
                content,
                http_response_code,
                ..
            } => {
                if content.is_empty() {
                    return Err(HpkeError::PaymentResponseContent);
                }
                if let Some(code) = http_response_code {
                    if *code != 200 {
                        return Err(HpkeError::PaymentResponseHttpCode(*code));
                    }
                }
                let header =
                    HeaderEntry::new(HEADER_PAYMENT_RESPONSE, Value::Object(content.clone()));
                (Some(header), Map::new(), Some(200))
            }
            Self::PaymentRequired {
                content,
                http_response_code,
                ..
            } => {
                if content.is_empty() {
                    return Err(HpkeError::PaymentRequiredContent);
                }
                if let Some(code) = http_response_code {
                    if *code != 402 {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            status = *code,
                            "PAYMENT_REQUIRED status coerced to 402"
                        );
                    }
                }
                (None, content.clone(), Some(402))
            }
            Self::OtherRequest { content, .. } => (None, content.clone(), None),
            Self::OtherResponse {
                content,
                http_response_code,
                ..
            } => {
                if *http_response_code == 402 {
                    return Err(HpkeError::OtherResponse402);
                }
                (None, content.clone(), Some(*http_response_code))
            }
        };

        let extensions = normalize_extensions(self.extensions(), registry)?;

        Ok(NormalizedTransport {
            header_core,
            body,
            extensions,
            effective_http_response_code,
        })
    }
}

fn normalize_extensions(
    extensions: &[Extension],
    registry: &HeaderRegistry,
) -> Result<Vec<HeaderEntry>> {
    let mut normalized: Vec<HeaderEntry> = Vec::with_capacity(extensions.len());
    for ext in extensions {
        let canonical = registry
            .canonical_extension(&ext.name)
            .ok_or_else(|| HpkeError::ExtensionUnapproved(ext.name.clone()))?
            .to_string();
        if !ext.value.is_object() {
            return Err(HpkeError::ExtensionPayload(canonical));
        }
        if normalized
            .iter()
            .any(|entry| entry.name.eq_ignore_ascii_case(&canonical))
        {
            return Err(HpkeError::ExtensionDuplicate(canonical));
        }
        normalized.push(HeaderEntry::new(canonical, ext.value.clone()));
    }
    Ok(normalized)
}
