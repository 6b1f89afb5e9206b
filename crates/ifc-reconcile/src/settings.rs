//! Three-way settings merge.
//!
//! Values arrive as weakly typed JSON from two directions: the platform
//! (numbers always floating point, structured fields as objects or encoded
//! strings) and the operator's declaration. Both are coerced into
//! [`SettingValue`] by the destination field's [`FieldKind`] here, so nothing
//! downstream handles untyped JSON.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::canonical::{canonical_value, canonicalize};
use crate::error::ReconcileError;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Bool,
    Text,
    /// Nested object or list, held in canonical encoded form.
    Structured,
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            FieldKind::Int => "integer",
            FieldKind::Float => "number",
            FieldKind::Bool => "boolean",
            FieldKind::Text => "string",
            FieldKind::Structured => "JSON object or array",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    /// Sent on every write even when only reported remotely.
    pub always_send: bool,
}

impl FieldSpec {
    pub const fn new(key: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            kind,
            always_send: false,
        }
    }

    pub const fn always_sent(key: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            kind,
            always_send: true,
        }
    }
}

/// Fixed set of fields a resource's settings are reconciled over.
#[derive(Debug)]
pub struct SettingsSchema {
    name: &'static str,
    fields: &'static [FieldSpec],
}

impl SettingsSchema {
    pub const fn new(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn field(&self, key: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A present setting value. Absence is the key being missing from the view.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Structured(String),
}

impl SettingValue {
    /// Encoding sent to the platform: structured values as real JSON.
    pub fn to_wire(&self) -> Value {
        match self {
            SettingValue::Structured(s) => {
                serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
            }
            other => other.to_record(),
        }
    }

    /// Encoding persisted in recorded state: structured values as their
    /// canonical string.
    pub fn to_record(&self) -> Value {
        match self {
            SettingValue::Bool(b) => Value::Bool(*b),
            SettingValue::Int(i) => Value::from(*i),
            SettingValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            SettingValue::Text(s) | SettingValue::Structured(s) => Value::String(s.clone()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) | SettingValue::Structured(s) => Some(s),
            _ => None,
        }
    }
}

/// Typed settings keyed by the platform's field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsView {
    values: BTreeMap<String, SettingValue>,
}

impl SettingsView {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Lenient coercion of platform-reported settings. Values of the wrong
    /// shape and unknown keys are dropped.
    pub fn from_remote(schema: &SettingsSchema, raw: &Map<String, Value>) -> Self {
        let mut values = BTreeMap::new();
        for spec in schema.fields() {
            if let Some(v) = raw.get(spec.key).and_then(|v| coerce_lenient(spec.kind, v)) {
                values.insert(spec.key.to_string(), v);
            }
        }
        Self { values }
    }

    /// Strict coercion of declared settings. `null` means unset; unknown keys
    /// are ignored; anything else that cannot be coerced is a
    /// [`ReconcileError::SchemaViolation`].
    pub fn from_declared(
        schema: &SettingsSchema,
        raw: &Map<String, Value>,
    ) -> Result<Self, ReconcileError> {
        let mut values = BTreeMap::new();
        for spec in schema.fields() {
            let Some(v) = raw.get(spec.key) else {
                continue;
            };
            if let Some(coerced) = coerce_strict(spec, v)? {
                values.insert(spec.key.to_string(), coerced);
            }
        }
        Ok(Self { values })
    }

    /// Re-read a previously persisted view. Same leniency as platform input.
    pub fn from_record(schema: &SettingsSchema, raw: &Map<String, Value>) -> Self {
        Self::from_remote(schema, raw)
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: SettingValue) {
        self.values.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.values.iter()
    }

    pub fn to_wire(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_wire()))
            .collect()
    }

    pub fn to_record(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_record()))
            .collect()
    }
}

fn coerce_lenient(kind: FieldKind, v: &Value) -> Option<SettingValue> {
    match (kind, v) {
        (_, Value::Null) => None,
        (FieldKind::Int, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(SettingValue::Int),
        (FieldKind::Float, Value::Number(n)) => n.as_f64().map(SettingValue::Float),
        (FieldKind::Bool, Value::Bool(b)) => Some(SettingValue::Bool(*b)),
        (FieldKind::Text, Value::String(s)) => Some(SettingValue::Text(s.clone())),
        (FieldKind::Structured, Value::String(s)) => {
            Some(SettingValue::Structured(canonicalize(s)))
        }
        (FieldKind::Structured, Value::Object(_) | Value::Array(_)) => {
            Some(SettingValue::Structured(canonical_value(v)))
        }
        _ => None,
    }
}

fn coerce_strict(spec: &FieldSpec, v: &Value) -> Result<Option<SettingValue>, ReconcileError> {
    let violation = || ReconcileError::schema_violation(spec.key, spec.kind.expected(), describe(v));

    let out = match (spec.kind, v) {
        (_, Value::Null) => return Ok(None),
        (FieldKind::Int, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                SettingValue::Int(i)
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        SettingValue::Int(f as i64)
                    }
                    _ => return Err(violation()),
                }
            }
        }
        (FieldKind::Float, Value::Number(n)) => {
            SettingValue::Float(n.as_f64().ok_or_else(violation)?)
        }
        (FieldKind::Bool, Value::Bool(b)) => SettingValue::Bool(*b),
        (FieldKind::Text, Value::String(s)) => SettingValue::Text(s.clone()),
        (FieldKind::Text, Value::Number(n)) => SettingValue::Text(n.to_string()),
        (FieldKind::Text, Value::Bool(b)) => SettingValue::Text(b.to_string()),
        (FieldKind::Structured, Value::String(s)) => SettingValue::Structured(canonicalize(s)),
        (FieldKind::Structured, Value::Object(_) | Value::Array(_)) => {
            SettingValue::Structured(canonical_value(v))
        }
        _ => return Err(violation()),
    };
    Ok(Some(out))
}

fn describe(v: &Value) -> String {
    match v {
        Value::String(s) => format!("string {s:?}"),
        Value::Number(n) => format!("number {n}"),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
        Value::Null => "null".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Result of a merge: what to send and what to record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationOutcome {
    pub outbound: SettingsView,
    pub recorded: SettingsView,
}

impl ReconciliationOutcome {
    /// True when nothing needs to be written.
    pub fn is_noop(&self) -> bool {
        self.outbound.is_empty()
    }
}

/// Merge platform-reported settings with declared settings, per field:
///
/// 1) a declared value wins in both `outbound` and `recorded`
/// 2) otherwise a reported value is recorded, and only sent when the field
///    is always sent
/// 3) otherwise the field is absent from both
///
/// Fails only when a declared value cannot be coerced to its field's kind.
pub fn merge(
    schema: &SettingsSchema,
    remote: &Map<String, Value>,
    declared: &Map<String, Value>,
) -> Result<ReconciliationOutcome, ReconcileError> {
    let remote = SettingsView::from_remote(schema, remote);
    let declared = SettingsView::from_declared(schema, declared)?;
    Ok(merge_views(schema, &remote, &declared))
}

/// [`merge`] over views that are already coerced.
pub fn merge_views(
    schema: &SettingsSchema,
    remote: &SettingsView,
    declared: &SettingsView,
) -> ReconciliationOutcome {
    let mut out = ReconciliationOutcome::default();

    for spec in schema.fields() {
        if let Some(v) = declared.get(spec.key) {
            // 1) declared
            out.outbound.insert(spec.key, v.clone());
            out.recorded.insert(spec.key, v.clone());
        } else if let Some(v) = remote.get(spec.key) {
            // 2) reported
            if spec.always_send {
                out.outbound.insert(spec.key, v.clone());
            }
            out.recorded.insert(spec.key, v.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::always_sent("projectName", FieldKind::Text),
        FieldSpec::new("x", FieldKind::Int),
        FieldSpec::new("ratio", FieldKind::Float),
        FieldSpec::new("flag", FieldKind::Bool),
        FieldSpec::new("blob", FieldKind::Structured),
    ];
    const SCHEMA: SettingsSchema = SettingsSchema::new("test", FIELDS);

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn remote_only_value_is_recorded_not_sent() {
        let out = merge(&SCHEMA, &obj(json!({"x": 5})), &Map::new()).unwrap();
        assert_eq!(out.recorded.get("x"), Some(&SettingValue::Int(5)));
        assert!(!out.outbound.contains("x"));
        assert!(out.is_noop());
    }

    #[test]
    fn declared_value_wins_everywhere() {
        let out = merge(&SCHEMA, &obj(json!({"x": 5})), &obj(json!({"x": 7}))).unwrap();
        assert_eq!(out.recorded.get("x"), Some(&SettingValue::Int(7)));
        assert_eq!(out.outbound.get("x"), Some(&SettingValue::Int(7)));
    }

    #[test]
    fn always_sent_fields_are_retransmitted() {
        let out = merge(&SCHEMA, &obj(json!({"projectName": "p1"})), &Map::new()).unwrap();
        assert_eq!(
            out.outbound.get("projectName"),
            Some(&SettingValue::Text("p1".into()))
        );
    }

    #[test]
    fn remote_floats_are_truncated_for_integer_fields() {
        let out = merge(&SCHEMA, &obj(json!({"x": 3.9, "ratio": 2})), &Map::new()).unwrap();
        assert_eq!(out.recorded.get("x"), Some(&SettingValue::Int(3)));
        assert_eq!(out.recorded.get("ratio"), Some(&SettingValue::Float(2.0)));
    }

    #[test]
    fn declared_integral_float_is_accepted_fractional_is_rejected() {
        let ok = merge(&SCHEMA, &Map::new(), &obj(json!({"x": 4.0}))).unwrap();
        assert_eq!(ok.recorded.get("x"), Some(&SettingValue::Int(4)));

        let err = merge(&SCHEMA, &Map::new(), &obj(json!({"x": 4.5}))).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::SchemaViolation { ref field, .. } if field == "x"
        ));
    }

    #[test]
    fn declared_wrong_type_is_a_schema_violation() {
        let err = merge(&SCHEMA, &Map::new(), &obj(json!({"flag": "yes"}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field 'flag' cannot be coerced: expected boolean, got string \"yes\""
        );
    }

    #[test]
    fn declared_false_is_distinct_from_unset() {
        let out = merge(
            &SCHEMA,
            &obj(json!({"flag": true})),
            &obj(json!({"flag": false})),
        )
        .unwrap();
        assert_eq!(out.outbound.get("flag"), Some(&SettingValue::Bool(false)));

        let unset = merge(
            &SCHEMA,
            &obj(json!({"flag": true})),
            &obj(json!({"flag": null})),
        )
        .unwrap();
        assert!(!unset.outbound.contains("flag"));
        assert_eq!(unset.recorded.get("flag"), Some(&SettingValue::Bool(true)));
    }

    #[test]
    fn structured_values_compare_equal_across_origins() {
        let from_remote = merge(
            &SCHEMA,
            &obj(json!({"blob": {"b": [1, 2], "a": "s"}})),
            &Map::new(),
        )
        .unwrap();
        let from_declared = merge(
            &SCHEMA,
            &Map::new(),
            &obj(json!({"blob": "{ \"a\": \"s\", \"b\": [1,2] }"})),
        )
        .unwrap();
        assert_eq!(from_remote.recorded, from_declared.recorded);
        assert_eq!(
            from_declared.outbound.to_wire()["blob"],
            json!({"a": "s", "b": [1, 2]})
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let out = merge(
            &SCHEMA,
            &obj(json!({"mystery": 1})),
            &obj(json!({"other": "v"})),
        )
        .unwrap();
        assert!(out.recorded.is_empty());
        assert!(out.outbound.is_empty());
    }
}
