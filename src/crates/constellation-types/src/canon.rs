//! Canonical serialization and content hashing.
//!
//! Two different subsystems need a stable, order-independent byte
//! representation of a value or type: the cache subsystem's key derivation
//! (spec §4.7, "two equivalent inputs yield identical keys regardless of
//! insertion order") and the DAG compiler's structural hash (testable
//! property 9: "renaming identifiers must not change the structural
//! hash"). Both build on the same primitive here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::ty::Type;
use crate::value::Value;

/// Renders a value into a canonical string: record/map keys sorted,
/// every variant tagged so two structurally equal values with different
/// construction order produce identical output.
pub fn canonical_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => {
            out.push('S');
            out.push(':');
            escape_into(out, s);
        }
        Value::Int(i) => {
            out.push('I');
            out.push(':');
            out.push_str(&i.to_string());
        }
        Value::Float(f) => {
            out.push('F');
            out.push(':');
            out.push_str(&f.to_bits().to_string());
        }
        Value::Bool(b) => {
            out.push('B');
            out.push(':');
            out.push_str(if *b { "1" } else { "0" });
        }
        Value::List { items, .. } => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Map { entries, .. } => {
            let mut rendered: Vec<String> = entries
                .iter()
                .map(|(k, v)| {
                    let mut pair = String::new();
                    write_value(&mut pair, k);
                    pair.push('=');
                    write_value(&mut pair, v);
                    pair
                })
                .collect();
            rendered.sort();
            out.push('{');
            out.push_str(&rendered.join(","));
            out.push('}');
        }
        Value::Product(fields) => {
            // BTreeMap iteration is already key-sorted.
            out.push('P');
            out.push('{');
            for (i, (name, field_value)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                escape_into(out, name);
                out.push(':');
                write_value(out, field_value);
            }
            out.push('}');
        }
        Value::Union { tag, value, .. } => {
            out.push('U');
            out.push('(');
            escape_into(out, tag);
            out.push(')');
            out.push(':');
            write_value(out, value);
        }
        Value::Some_ { value, .. } => {
            out.push_str("Some(");
            write_value(out, value);
            out.push(')');
        }
        Value::None_ { .. } => {
            out.push_str("None");
        }
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            ':' => out.push_str("\\:"),
            ',' => out.push_str("\\,"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
}

/// Canonical rendering of a `Type`, used by the DAG compiler's structural
/// hash. Field/variant maps are already `BTreeMap`-ordered.
pub fn canonical_type(ty: &Type) -> String {
    ty.to_string()
}

/// SHA-256 of `bytes`, URL-safe base64 without padding.
pub fn sha256_base64url(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    URL_SAFE_NO_PAD.encode(digest)
}

/// Derives a deterministic cache key from a module name, its canonical
/// input values (already sorted by argument name by the caller), and an
/// optional module version string.
pub fn cache_key(module_name: &str, sorted_inputs: &[(String, Value)], version: Option<&str>) -> String {
    let mut buf = String::new();
    buf.push_str(module_name);
    buf.push('|');
    if let Some(v) = version {
        buf.push_str(v);
    }
    buf.push('|');
    for (i, (name, value)) in sorted_inputs.iter().enumerate() {
        if i > 0 {
            buf.push(';');
        }
        escape_into(&mut buf, name);
        buf.push('=');
        buf.push_str(&canonical_value(value));
    }
    sha256_base64url(buf.as_bytes())
}
