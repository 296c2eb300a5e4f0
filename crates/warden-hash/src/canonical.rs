//! Deterministic canonical encoding of JSON-shaped values.
//!
//! Mapping keys are emitted in lexicographic order, array order is preserved,
//! and whitespace is never emitted. Two semantically equal `serde_json::Value`
//! trees always produce byte-identical output, independent of the order keys
//! were inserted in and independent of whether `serde_json`'s `preserve_order`
//! feature is enabled — the sort happens here, not in the `Value` itself.
//!
//! Absent (unset) fields never reach this function: callers build the `Value`
//! with `serde_json::to_value` after `#[serde(skip_serializing_if = "Option::is_none")]`
//! has already dropped them. An explicit JSON `null` is still emitted as-is.

use serde::Serialize;
use serde_json::Value;

/// Canonicalise `value` into its deterministic byte encoding.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

/// Convenience for any `Serialize` type: round-trip through `serde_json::Value`
/// then canonicalise.
pub fn canonical_bytes_of<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let v = serde_json::to_value(value)?;
    Ok(canonical_bytes(&v))
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_string(key, out);
                out.push(b':');
                write_canonical(&map[*key], out);
            }
            out.push(b'}');
        }
    }
}

fn write_json_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

/// Remove a set of top-level dotted paths from a `Value` object before
/// canonicalising it — used to exclude `chain.contentHash`, `chain.signature`,
/// `contextHash` and `receivedAt` from an entry's content hash per spec §4.A.
pub fn without_paths(mut value: Value, paths: &[&str]) -> Value {
    for path in paths {
        remove_path(&mut value, path);
    }
    value
}

fn remove_path(value: &mut Value, path: &str) {
    let mut segments = path.splitn(2, '.');
    let head = segments.next().unwrap_or_default();
    let rest = segments.next();
    if let Value::Object(map) = value {
        match rest {
            Some(rest) => {
                if let Some(child) = map.get_mut(head) {
                    remove_path(child, rest);
                }
            }
            None => {
                map.remove(head);
            }
        }
    }
}
