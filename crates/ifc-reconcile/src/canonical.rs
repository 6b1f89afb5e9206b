use serde_json::{Map, Value};

/// Encoded form of an empty rule list.
pub const EMPTY_RULES: &str = "[]";

/// Normalize a JSON-encoded value to a byte-stable compact form.
///
/// Object keys are emitted in sorted order, so two inputs that parse to the
/// same structure produce identical output. Input that does not parse is
/// returned unchanged. `""` and `"[]"` skip the parse entirely.
pub fn canonicalize(raw: &str) -> String {
    if raw.is_empty() || raw == EMPTY_RULES {
        return raw.to_string();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(v) => canonical_value(&v),
        Err(_) => raw.to_string(),
    }
}

/// Canonical compact encoding of an already-parsed value.
pub fn canonical_value(v: &Value) -> String {
    sorted(v).to_string()
}

/// True when an encoded rule list carries no rules.
pub fn is_empty_rules(raw: &str) -> bool {
    let t = raw.trim();
    t.is_empty() || t == EMPTY_RULES
}

// Rebuilds objects key-sorted. Holds even when serde_json's map keeps
// insertion order.
fn sorted(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), sorted(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
