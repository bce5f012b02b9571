//! Header names and the approved-extension registry.
//!
//! A message carries at most one core x402 header plus any number of
//! approved extension headers. Name matching is case-insensitive everywhere;
//! the canonical casing defined here is what gets stored and authenticated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical name of the payment header.
pub const HEADER_PAYMENT: &str = "X-Payment";

/// Canonical name of the payment-response header.
pub const HEADER_PAYMENT_RESPONSE: &str = "X-Payment-Response";

/// Empty-string sentinel marking a Payment-Required body reassignment.
pub const HEADER_PAYMENT_REQUIRED_MARKER: &str = "";

/// Uppercase alias of [`HEADER_PAYMENT`] used on the sidecar wire.
pub const SIDECAR_PAYMENT: &str = "X-PAYMENT";

/// Uppercase alias of [`HEADER_PAYMENT_RESPONSE`] used on the sidecar wire.
pub const SIDECAR_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";

/// Extension header names approved for use in x402 messages, in their
/// canonical casing.
pub const APPROVED_EXTENSION_HEADERS: [&str; 5] = [
    "X-402-Routing",
    "X-402-Limits",
    "X-402-Acceptable",
    "X-402-Metadata",
    "X-402-Security",
];

/// A single header entry as bound into the AAD.
///
/// `extras` keys serialize flattened next to `name` and `value`, so an entry
/// is one flat JSON object on the wire and canonicalizes deterministically.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HeaderEntry {
    /// Header name in canonical casing (or the empty-string marker)
    pub name: String,

    /// Header value; always a JSON object for core and extension headers
    pub value: Value,

    /// Additional fields carried verbatim alongside name and value
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl HeaderEntry {
    /// Creates an entry with no extras.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            extras: Map::new(),
        }
    }
}

/// Returns the canonical casing for a core header name, matched
/// case-insensitively. The empty string is the Payment-Required marker and
/// canonicalizes to itself.
///
/// # Examples
///
/// ```
/// use x402_hpke::headers::canonical_core_name;
///
/// assert_eq!(canonical_core_name("x-payment"), Some("X-Payment"));
/// assert_eq!(canonical_core_name("X-PAYMENT-RESPONSE"), Some("X-Payment-Response"));
/// assert_eq!(canonical_core_name(""), Some(""));
/// assert_eq!(canonical_core_name("X-402-Routing"), None);
/// ```
pub fn canonical_core_name(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        return Some(HEADER_PAYMENT_REQUIRED_MARKER);
    }
    if name.eq_ignore_ascii_case(HEADER_PAYMENT) {
        return Some(HEADER_PAYMENT);
    }
    if name.eq_ignore_ascii_case(HEADER_PAYMENT_RESPONSE) {
        return Some(HEADER_PAYMENT_RESPONSE);
    }
    None
}

/// Per-instance registry of approved extension header names.
///
/// The five standard extension names are compiled in. Applications that
/// genuinely need additional approved names extend a registry instance with
/// [`HeaderRegistry::with_approved`] and pass it to the seal request; there
/// is no process-wide mutable state.
///
/// # Examples
///
/// ```
/// use x402_hpke::headers::HeaderRegistry;
///
/// let registry = HeaderRegistry::default().with_approved("X-Acme-Trace");
/// assert_eq!(registry.canonical_extension("x-402-routing"), Some("X-402-Routing"));
/// assert_eq!(registry.canonical_extension("X-ACME-TRACE"), Some("X-Acme-Trace"));
/// assert_eq!(registry.canonical_extension("X-Unknown"), None);
/// ```
#[derive(Clone, Debug)]
pub struct HeaderRegistry {
    approved: Vec<String>,
}

impl Default for HeaderRegistry {
    fn default() -> Self {
        Self {
            approved: APPROVED_EXTENSION_HEADERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl HeaderRegistry {
    /// Adds an approved extension name in its canonical casing.
    ///
    /// Adding a name that is already approved (case-insensitively) is a
    /// no-op; the first-registered casing wins.
    pub fn with_approved(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.canonical_extension(&name).is_none() {
            self.approved.push(name);
        }
        self
    }

    /// Looks up the canonical casing for an extension name,
    /// case-insensitively. Returns `None` for unapproved names.
    pub fn canonical_extension(&self, name: &str) -> Option<&str> {
        self.approved
            .iter()
            .find(|approved| approved.eq_ignore_ascii_case(name))
            .map(|s| s.as_str())
    }

    /// Returns whether the name is an approved extension header.
    pub fn is_approved(&self, name: &str) -> bool {
        self.canonical_extension(name).is_some()
    }
}
