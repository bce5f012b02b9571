//! Canonical JSON encoding for deterministic AAD construction.
//!
//! Every byte of the AAD must be reproducible across implementations, so the
//! codec does not rely on any JSON library's serialization order. This module
//! walks the value tree directly and emits a byte-deterministic encoding:
//! object keys sorted by Unicode code point at every depth, no whitespace,
//! array order preserved, and integral numbers written without a decimal
//! point.
//!
//! [`serde_json::Value`] cannot represent cycles or non-finite numbers, so
//! canonicalization is total on its input type.

use serde_json::Value;

/// Maximum magnitude that is exactly representable in an IEEE-754 double,
/// mirroring the safe-integer range of other implementations.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Serializes a JSON value into its canonical string form.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use x402_hpke::canonical::canonical_json;
///
/// let value = json!({"b": 1, "a": {"z": [3, 1, 2], "y": true}});
/// assert_eq!(canonical_json(&value), r#"{"a":{"y":true,"z":[3,1,2]},"b":1}"#);
/// ```
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Serializes a JSON value into canonical UTF-8 bytes.
///
/// Equivalent to [`canonical_json`] followed by UTF-8 encoding; this is the
/// form bound into the AAD and the AEAD plaintext.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    canonical_json(value).into_bytes()
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Keys sorted by code point regardless of the map's own ordering.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key.as_str()]);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, n: &serde_json::Number) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else if let Some(f) = n.as_f64() {
        // Integral doubles inside the safe range drop the decimal point so
        // that 2.0 and 2 canonicalize identically.
        if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
            out.push_str(&(f as i64).to_string());
        } else {
            out.push_str(&n.to_string());
        }
    } else {
        out.push_str(&n.to_string());
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
