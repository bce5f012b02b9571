//! AAD construction and parsing.
//!
//! The additional authenticated data is the textual form
//! `"<ns>|v1|<headers-json>|<body-json>"`, UTF-8 encoded. Both JSON segments
//! use canonical encoding, and the headers array is sorted case-insensitively
//! by name, so the AAD is a pure function of the logical message: the same
//! namespace, headers, and body always produce identical bytes.

use crate::canonical::canonical_json;
use crate::errors::{HpkeError, Result};
use crate::headers::{canonical_core_name, HeaderEntry, HeaderRegistry};
use serde_json::{Map, Value};

/// Version tag bound into the second AAD segment.
pub const AAD_VERSION_TAG: &str = "v1";

/// Output of [`build_aad`]: the authenticated bytes plus the normalized
/// copies the sidecar verifier compares against.
#[derive(Debug, Clone)]
pub struct AadBundle {
    /// Canonical AAD bytes, bound into the AEAD
    pub bytes: Vec<u8>,

    /// Headers in canonical casing, sorted as serialized
    pub headers_normalized: Vec<HeaderEntry>,

    /// The body object as serialized into the AAD
    pub body_normalized: Map<String, Value>,
}

/// Rejects an empty namespace or the reserved `"x402"` value (any casing).
pub fn validate_namespace(ns: &str) -> Result<()> {
    if ns.is_empty() || ns.eq_ignore_ascii_case("x402") {
        return Err(HpkeError::NsForbidden);
    }
    Ok(())
}

/// Builds canonical AAD bytes from a namespace, header list, and body.
///
/// Header names are canonicalized (core names to their canonical casing,
/// extension names to their registry form), the list is sorted
/// case-insensitively by code point, and collisions are rejected before any
/// bytes are produced.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Map};
/// use x402_hpke::aad::build_aad;
/// use x402_hpke::headers::{HeaderEntry, HeaderRegistry};
///
/// let headers = vec![HeaderEntry::new("x-payment", json!({"payload": {}}))];
/// let bundle = build_aad("myapp", &headers, &Map::new(), &HeaderRegistry::default()).unwrap();
/// assert_eq!(
///     String::from_utf8(bundle.bytes).unwrap(),
///     r#"myapp|v1|[{"name":"X-Payment","value":{"payload":{}}}]|{}"#
/// );
/// ```
pub fn build_aad(
    ns: &str,
    headers: &[HeaderEntry],
    body: &Map<String, Value>,
    registry: &HeaderRegistry,
) -> Result<AadBundle> {
    validate_namespace(ns)?;

    let mut normalized: Vec<HeaderEntry> = Vec::with_capacity(headers.len());
    let mut core_count = 0usize;
    for header in headers {
        let canonical_name = match canonical_core_name(&header.name) {
            Some(core) => {
                core_count += 1;
                core.to_string()
            }
            None => registry
                .canonical_extension(&header.name)
                .ok_or_else(|| HpkeError::ExtensionUnapproved(header.name.clone()))?
                .to_string(),
        };
        normalized.push(HeaderEntry {
            name: canonical_name,
            value: header.value.clone(),
            extras: header.extras.clone(),
        });
    }
    if core_count > 1 {
        return Err(HpkeError::MultipleCoreHeaders);
    }

    for key in body.keys() {
        if normalized
            .iter()
            .any(|header| header.name.eq_ignore_ascii_case(key))
        {
            return Err(HpkeError::BodyHeaderNameCollision(key.clone()));
        }
    }

    normalized.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
    });
    for pair in normalized.windows(2) {
        if pair[0].name.eq_ignore_ascii_case(&pair[1].name) {
            return Err(HpkeError::ExtensionDuplicate(pair[1].name.clone()));
        }
    }

    let headers_json = canonical_json(&Value::Array(
        normalized.iter().map(header_to_value).collect(),
    ));
    let body_json = canonical_json(&Value::Object(body.clone()));

    let mut text = String::with_capacity(
        ns.len() + AAD_VERSION_TAG.len() + headers_json.len() + body_json.len() + 3,
    );
    text.push_str(ns);
    text.push('|');
    text.push_str(AAD_VERSION_TAG);
    text.push('|');
    text.push_str(&headers_json);
    text.push('|');
    text.push_str(&body_json);

    Ok(AadBundle {
        bytes: text.into_bytes(),
        headers_normalized: normalized,
        body_normalized: body.clone(),
    })
}

fn header_to_value(entry: &HeaderEntry) -> Value {
    let mut obj = entry.extras.clone();
    obj.insert("name".to_string(), Value::String(entry.name.clone()));
    obj.insert("value".to_string(), entry.value.clone());
    Value::Object(obj)
}

/// Parses authenticated AAD bytes back into headers and body.
///
/// Validates the four-segment pipe layout and the `"<ns>|v1|"` prefix, then
/// recovers the exact headers-array and body-object segments. The segment
/// boundary is found by parsing the headers JSON to its end rather than by
/// splitting on pipes, since canonical JSON may contain `|` inside strings.
pub fn parse_aad(bytes: &[u8], expected_ns: &str) -> Result<(Vec<HeaderEntry>, Map<String, Value>)> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| HpkeError::InvalidEnvelope("AAD is not valid UTF-8".to_string()))?;

    if text.split('|').count() < 4 {
        return Err(HpkeError::InvalidEnvelope(
            "AAD must have at least four pipe-separated segments".to_string(),
        ));
    }

    let prefix = format!("{}|{}|", expected_ns, AAD_VERSION_TAG);
    let rest = text.strip_prefix(&prefix).ok_or_else(|| {
        HpkeError::InvalidEnvelope("AAD namespace or version segment mismatch".to_string())
    })?;

    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
    let headers_value = match stream.next() {
        Some(Ok(value)) => value,
        _ => {
            return Err(HpkeError::InvalidEnvelope(
                "AAD headers segment is not valid JSON".to_string(),
            ))
        }
    };
    let consumed = stream.byte_offset();

    let body_segment = rest[consumed..].strip_prefix('|').ok_or_else(|| {
        HpkeError::InvalidEnvelope("AAD body segment separator missing".to_string())
    })?;

    let headers: Vec<HeaderEntry> = match headers_value {
        Value::Array(_) => serde_json::from_value(headers_value).map_err(|e| {
            HpkeError::InvalidEnvelope(format!("AAD headers segment malformed: {}", e))
        })?,
        _ => {
            return Err(HpkeError::InvalidEnvelope(
                "AAD headers segment must be a JSON array".to_string(),
            ))
        }
    };

    let body_value: Value = serde_json::from_str(body_segment).map_err(|e| {
        HpkeError::InvalidEnvelope(format!("AAD body segment is not valid JSON: {}", e))
    })?;
    let body = match body_value {
        Value::Object(map) => map,
        _ => {
            return Err(HpkeError::InvalidEnvelope(
                "AAD body segment must be a JSON object".to_string(),
            ))
        }
    };

    Ok((headers, body))
}
