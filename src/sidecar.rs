//! Sidecar projection and verification.
//!
//! The sidecar is a selectively-public view of AAD-bound entities: a map of
//! uppercase header names to canonical-JSON strings, plus an optional subset
//! of the body object. Middleware can route on it without opening the
//! envelope; the open path re-derives every projected value from the
//! authenticated AAD and compares in constant time, so a sidecar can never
//! disagree with what the AEAD authenticated.

use crate::canonical::canonical_json;
use crate::errors::{HpkeError, Result};
use crate::headers::{HeaderEntry, SIDECAR_PAYMENT, SIDECAR_PAYMENT_RESPONSE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

/// Which AAD-bound entities to project publicly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Project every header and every top-level body key
    All,

    /// Project the named headers (case-insensitive) and body keys (exact)
    Names(Vec<String>),
}

impl Visibility {
    /// Parses the wire-level selector: `"all"` and `"*"` select everything,
    /// anything else is a single name.
    pub fn parse(selector: &str) -> Self {
        if selector == "all" || selector == "*" {
            Self::All
        } else {
            Self::Names(vec![selector.to_string()])
        }
    }
}

impl From<Vec<String>> for Visibility {
    fn from(names: Vec<String>) -> Self {
        Self::Names(names)
    }
}

/// The public projection emitted next to an envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Sidecar {
    /// Uppercase header name to canonical-JSON value string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_headers: Option<BTreeMap<String, String>>,

    /// Verbatim subset of the body object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_body: Option<Map<String, Value>>,
}

impl Sidecar {
    /// Returns the headers-as-JSON form of `public_headers`: the same set,
    /// with each canonical-JSON string parsed into a JSON value.
    pub fn public_json(&self) -> Result<Option<Map<String, Value>>> {
        let Some(headers) = &self.public_headers else {
            return Ok(None);
        };
        let mut out = Map::new();
        for (name, encoded) in headers {
            let value: Value = serde_json::from_str(encoded).map_err(|e| {
                HpkeError::InvalidEnvelope(format!("sidecar value for '{}' is not JSON: {}", name, e))
            })?;
            out.insert(name.clone(), value);
        }
        Ok(Some(out))
    }
}

fn matches_name(candidates: &[String], name: &str) -> bool {
    candidates.iter().any(|c| c.eq_ignore_ascii_case(name))
}

/// Projects the requested subset of headers and body keys.
///
/// When the effective status is 402 the core payment headers are excluded
/// from consideration regardless of the request. Returns `None` when the
/// selection is empty.
pub fn project(
    headers_normalized: &[HeaderEntry],
    body_normalized: &Map<String, Value>,
    effective_http_response_code: Option<u16>,
    public: Option<&Visibility>,
    private: &[String],
) -> Option<Sidecar> {
    let public = public?;

    let suppress_core = effective_http_response_code == Some(402);
    let mut public_headers = BTreeMap::new();
    for entry in headers_normalized {
        let upper = entry.name.to_uppercase();
        if suppress_core && (upper == SIDECAR_PAYMENT || upper == SIDECAR_PAYMENT_RESPONSE) {
            continue;
        }
        let selected = match public {
            Visibility::All => true,
            Visibility::Names(names) => matches_name(names, &entry.name),
        };
        if !selected || matches_name(private, &entry.name) {
            continue;
        }
        public_headers.insert(upper, canonical_json(&entry.value));
    }

    let mut public_body = Map::new();
    for (key, value) in body_normalized {
        let selected = match public {
            Visibility::All => true,
            Visibility::Names(names) => names.iter().any(|n| n == key),
        };
        if !selected || private.iter().any(|n| n == key) {
            continue;
        }
        public_body.insert(key.clone(), value.clone());
    }

    if public_headers.is_empty() && public_body.is_empty() {
        return None;
    }

    Some(Sidecar {
        public_headers: (!public_headers.is_empty()).then_some(public_headers),
        public_body: (!public_body.is_empty()).then_some(public_body),
    })
}

/// Verifies supplied public values against the authenticated AAD copies.
///
/// Every supplied header (string form or JSON form) and body key must exist
/// in the AAD and match it byte-for-byte after canonicalization. Comparison
/// uses a constant-time primitive.
pub fn verify(
    headers_normalized: &[HeaderEntry],
    body_normalized: &Map<String, Value>,
    public_headers: Option<&BTreeMap<String, String>>,
    public_json: Option<&Map<String, Value>>,
    public_body: Option<&Map<String, Value>>,
) -> Result<()> {
    if let Some(headers) = public_headers {
        for (name, supplied) in headers {
            verify_header(headers_normalized, name, supplied.trim())?;
        }
    }
    if let Some(headers) = public_json {
        for (name, supplied) in headers {
            verify_header(headers_normalized, name, &canonical_json(supplied))?;
        }
    }
    if let Some(body) = public_body {
        for (key, supplied) in body {
            let expected = body_normalized
                .get(key)
                .ok_or_else(|| HpkeError::PublicKeyNotInAad(key.clone()))?;
            if !ct_eq(
                canonical_json(expected).as_bytes(),
                canonical_json(supplied).as_bytes(),
            ) {
                return Err(HpkeError::AadMismatch(key.clone()));
            }
        }
    }
    Ok(())
}

fn verify_header(headers_normalized: &[HeaderEntry], name: &str, supplied: &str) -> Result<()> {
    let entry = headers_normalized
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| HpkeError::PublicKeyNotInAad(name.to_string()))?;
    let expected = canonical_json(&entry.value);
    if !ct_eq(expected.as_bytes(), supplied.as_bytes()) {
        return Err(HpkeError::AadMismatch(name.to_string()));
    }
    Ok(())
}

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers() -> Vec<HeaderEntry> {
        vec![
            HeaderEntry::new("X-402-Routing", json!({"region": "eu"})),
            HeaderEntry::new("X-Payment", json!({"payload": {"invoiceId": "inv_1"}})),
        ]
    }

    fn body() -> Map<String, Value> {
        json!({"need": true, "amount": "10"})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_project_all() {
        let sidecar = project(&headers(), &body(), None, Some(&Visibility::All), &[]).unwrap();
        let public_headers = sidecar.public_headers.unwrap();

        assert_eq!(
            public_headers["X-PAYMENT"],
            r#"{"payload":{"invoiceId":"inv_1"}}"#
        );
        assert_eq!(public_headers["X-402-ROUTING"], r#"{"region":"eu"}"#);
        assert_eq!(sidecar.public_body.unwrap(), body());
    }

    #[test]
    fn test_project_by_name_is_case_insensitive_for_headers() {
        let visibility = Visibility::Names(vec!["x-payment".to_string()]);
        let sidecar = project(&headers(), &body(), None, Some(&visibility), &[]).unwrap();

        let public_headers = sidecar.public_headers.unwrap();
        assert_eq!(public_headers.len(), 1);
        assert!(public_headers.contains_key("X-PAYMENT"));
        assert!(sidecar.public_body.is_none());
    }

    #[test]
    fn test_project_body_keys_match_exactly() {
        let visibility = Visibility::Names(vec!["need".to_string(), "NEED".to_string()]);
        let sidecar = project(&headers(), &body(), None, Some(&visibility), &[]).unwrap();

        let public_body = sidecar.public_body.unwrap();
        assert_eq!(public_body.len(), 1);
        assert_eq!(public_body["need"], json!(true));
    }

    #[test]
    fn test_402_suppresses_core_payment_headers() {
        let sidecar = project(&headers(), &body(), Some(402), Some(&Visibility::All), &[]).unwrap();

        let public_headers = sidecar.public_headers.unwrap();
        assert!(!public_headers.contains_key("X-PAYMENT"));
        assert!(public_headers.contains_key("X-402-ROUTING"));
    }

    #[test]
    fn test_private_list_subtracts() {
        let sidecar = project(
            &headers(),
            &body(),
            None,
            Some(&Visibility::All),
            &["x-payment".to_string(), "amount".to_string()],
        )
        .unwrap();

        assert!(!sidecar.public_headers.unwrap().contains_key("X-PAYMENT"));
        assert!(!sidecar.public_body.unwrap().contains_key("amount"));
    }

    #[test]
    fn test_empty_selection_omits_sidecar() {
        assert!(project(&headers(), &body(), None, None, &[]).is_none());

        let visibility = Visibility::Names(vec!["X-Missing".to_string()]);
        assert!(project(&headers(), &body(), None, Some(&visibility), &[]).is_none());
    }

    #[test]
    fn test_visibility_parse() {
        assert_eq!(Visibility::parse("all"), Visibility::All);
        assert_eq!(Visibility::parse("*"), Visibility::All);
        assert_eq!(
            Visibility::parse("X-Payment"),
            Visibility::Names(vec!["X-Payment".to_string()])
        );
    }

    #[test]
    fn test_verify_accepts_projection() {
        let sidecar = project(&headers(), &body(), None, Some(&Visibility::All), &[]).unwrap();
        verify(
            &headers(),
            &body(),
            sidecar.public_headers.as_ref(),
            None,
            sidecar.public_body.as_ref(),
        )
        .unwrap();
    }

    #[test]
    fn test_verify_accepts_json_form() {
        let sidecar = project(&headers(), &body(), None, Some(&Visibility::All), &[]).unwrap();
        let public_json = sidecar.public_json().unwrap();
        verify(&headers(), &body(), None, public_json.as_ref(), None).unwrap();
    }

    #[test]
    fn test_verify_trims_whitespace() {
        let mut public_headers = BTreeMap::new();
        public_headers.insert(
            "X-PAYMENT".to_string(),
            format!("  {}\n", r#"{"payload":{"invoiceId":"inv_1"}}"#),
        );
        verify(&headers(), &body(), Some(&public_headers), None, None).unwrap();
    }

    #[test]
    fn test_verify_rejects_tampered_header() {
        let mut public_headers = BTreeMap::new();
        public_headers.insert(
            "X-PAYMENT".to_string(),
            r#"{"payload":{"invoiceId":"inv_2"}}"#.to_string(),
        );
        let err = verify(&headers(), &body(), Some(&public_headers), None, None).unwrap_err();
        assert_eq!(err.code(), "AAD_MISMATCH");
    }

    #[test]
    fn test_verify_rejects_unknown_header() {
        let mut public_headers = BTreeMap::new();
        public_headers.insert("X-402-LIMITS".to_string(), "{}".to_string());
        let err = verify(&headers(), &body(), Some(&public_headers), None, None).unwrap_err();
        assert_eq!(err.code(), "PUBLIC_KEY_NOT_IN_AAD");
    }

    #[test]
    fn test_verify_rejects_tampered_body_value() {
        let mut public_body = Map::new();
        public_body.insert("need".to_string(), json!(false));
        let err = verify(&headers(), &body(), None, None, Some(&public_body)).unwrap_err();
        assert_eq!(err.code(), "AAD_MISMATCH");
    }

    #[test]
    fn test_verify_rejects_unknown_body_key() {
        let mut public_body = Map::new();
        public_body.insert("missing".to_string(), json!(1));
        let err = verify(&headers(), &body(), None, None, Some(&public_body)).unwrap_err();
        assert_eq!(err.code(), "PUBLIC_KEY_NOT_IN_AAD");
    }

    #[test]
    fn test_sidecar_serialization_uses_camel_case() {
        let sidecar = project(&headers(), &body(), None, Some(&Visibility::All), &[]).unwrap();
        let json = serde_json::to_value(&sidecar).unwrap();
        assert!(json.get("publicHeaders").is_some());
        assert!(json.get("publicBody").is_some());
    }
}
