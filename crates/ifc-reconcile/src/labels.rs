use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::align::align;
use crate::canonical::{canonicalize, is_empty_rules};
use crate::error::ReconcileError;

// ---------------------------------------------------------------------------
// Label-type table
// ---------------------------------------------------------------------------

/// (label type, field name reported by the keywords endpoint)
const LABEL_FIELDS: &[(&str, &str)] = &[
    ("whitelist", "whitelist"),
    ("trainingWhitelist", "trainingWhitelist"),
    ("blacklist", "trainingBlacklistLabels"),
    ("featurelist", "featurelist"),
    ("incidentlist", "incidentlist"),
    ("triagelist", "triagelist"),
    ("patternName", "patternNameLabels"),
    ("patternSignature", "patternSignatureLabels"),
    ("patternMatchRegex", "patternMatchRegexLabels"),
    ("patternIgnoreRegex", "patternIgnoreRegexLabels"),
    ("customAction", "customActionLabels"),
    ("logEventID", "logEventIDLabels"),
    ("logSeverity", "logSeverityLabels"),
    ("logStatusCode", "logStatusCodeLabels"),
    ("alertEventType", "alertEventTypeLabels"),
    ("anomalyFeature", "anomalyFeatureLabels"),
    ("dataFilter", "dataFilterLabels"),
    ("instanceName", "instanceNameLabels"),
    ("dataQualityCheck", "dataQualityCheckLabels"),
    ("extractionBlacklist", "extractionBlacklist"),
];

/// Placement order for label types that have no previously recorded position.
pub const LABEL_FALLBACK_ORDER: &[&str] = &[
    "trainingWhitelist",
    "featurelist",
    "incidentlist",
    "triagelist",
    "patternName",
    "whitelist",
    "blacklist",
    "patternSignature",
    "patternMatchRegex",
    "patternIgnoreRegex",
    "customAction",
    "logEventID",
    "logSeverity",
    "logStatusCode",
    "alertEventType",
    "anomalyFeature",
    "dataFilter",
    "instanceName",
    "dataQualityCheck",
    "extractionBlacklist",
];

/// API field for a label type. Unmapped types pass through unchanged.
pub fn api_field_for(label_type: &str) -> &str {
    LABEL_FIELDS
        .iter()
        .find(|(t, _)| *t == label_type)
        .map(|(_, f)| *f)
        .unwrap_or(label_type)
}

/// Label type for an API field. Unmapped fields pass through unchanged.
pub fn label_type_for(api_field: &str) -> &str {
    LABEL_FIELDS
        .iter()
        .find(|(_, f)| *f == api_field)
        .map(|(t, _)| *t)
        .unwrap_or(api_field)
}

// ---------------------------------------------------------------------------
// LabelSetting
// ---------------------------------------------------------------------------

/// One label type and its rules, encoded as a JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSetting {
    pub label_type: String,
    pub rules: String,
}

impl LabelSetting {
    pub fn new(label_type: impl Into<String>, rules: impl Into<String>) -> Self {
        Self {
            label_type: label_type.into(),
            rules: rules.into(),
        }
    }

    /// Same setting with its rules in canonical form.
    pub fn canonical(&self) -> Self {
        Self::new(self.label_type.clone(), canonicalize(&self.rules))
    }

    pub fn is_empty(&self) -> bool {
        is_empty_rules(&self.rules)
    }
}

/// Reject blank or repeated label types and rules that are not a JSON array
/// of strings.
pub fn validate_labels(labels: &[LabelSetting]) -> Result<(), ReconcileError> {
    let mut seen = BTreeSet::new();
    for (i, l) in labels.iter().enumerate() {
        let label_type = l.label_type.trim();
        if label_type.is_empty() {
            return Err(ReconcileError::invalid_input(format!(
                "labels[{i}].label_type cannot be empty"
            )));
        }
        if !seen.insert(label_type) {
            return Err(ReconcileError::invalid_input(format!(
                "labels[{i}].label_type '{label_type}' is declared more than once"
            )));
        }
        let parsed: Result<Vec<String>, _> = serde_json::from_str(&l.rules);
        if parsed.is_err() {
            return Err(ReconcileError::schema_violation(
                format!("labels[{i}].rules"),
                "JSON array of strings",
                preview(&l.rules),
            ));
        }
    }
    Ok(())
}

/// Label types present in `previous` but absent from `declared`.
pub fn removed_label_types(previous: &[LabelSetting], declared: &[LabelSetting]) -> Vec<String> {
    let keep: BTreeSet<&str> = declared.iter().map(|l| l.label_type.as_str()).collect();
    previous
        .iter()
        .filter(|l| !keep.contains(l.label_type.as_str()))
        .map(|l| l.label_type.clone())
        .collect()
}

/// True when both lists carry the same non-empty rules per label type,
/// ignoring order and encoding.
pub fn same_labels(a: &[LabelSetting], b: &[LabelSetting]) -> bool {
    fn rules(labels: &[LabelSetting]) -> BTreeMap<&str, String> {
        labels
            .iter()
            .filter(|l| !l.is_empty())
            .map(|l| (l.label_type.as_str(), canonicalize(&l.rules)))
            .collect()
    }
    rules(a) == rules(b)
}

// ---------------------------------------------------------------------------
// Remote → recorded
// ---------------------------------------------------------------------------

/// Rebuild the recorded label list from the keywords reported remotely.
///
/// Label types keep their `previous` position; newly reported types are
/// placed by [`LABEL_FALLBACK_ORDER`], followed by unmapped types in sorted
/// order. Empty rule lists are dropped.
pub fn labels_from_remote(
    remote: &BTreeMap<String, String>,
    previous: &[LabelSetting],
) -> Vec<LabelSetting> {
    let by_type = remote_by_type(remote);

    let mut fallback: Vec<String> = LABEL_FALLBACK_ORDER.iter().map(|s| s.to_string()).collect();
    let known: BTreeSet<&str> = LABEL_FALLBACK_ORDER.iter().copied().collect();
    fallback.extend(
        by_type
            .keys()
            .filter(|t| !known.contains(t.as_str()))
            .cloned(),
    );

    build(&by_type, previous, &fallback)
}

/// Like [`labels_from_remote`] but only keeps label types already in
/// `previous`. Used where a resource manages a subset of a project's labels.
pub fn tracked_labels_from_remote(
    remote: &BTreeMap<String, String>,
    previous: &[LabelSetting],
) -> Vec<LabelSetting> {
    let by_type = remote_by_type(remote);
    build::<&str>(&by_type, previous, &[])
}

fn remote_by_type(remote: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    remote
        .iter()
        .filter(|(_, rules)| !is_empty_rules(rules))
        .map(|(field, rules)| (label_type_for(field).to_string(), canonicalize(rules)))
        .collect()
}

fn build<F: AsRef<str>>(
    by_type: &BTreeMap<String, String>,
    previous: &[LabelSetting],
    fallback: &[F],
) -> Vec<LabelSetting> {
    let valid: BTreeSet<String> = by_type.keys().cloned().collect();
    let previous_order: Vec<&str> = previous.iter().map(|l| l.label_type.as_str()).collect();

    align(&previous_order, &valid, fallback)
        .into_iter()
        .filter_map(|t| {
            let rules = by_type.get(&t)?.clone();
            Some(LabelSetting::new(t, rules))
        })
        .collect()
}

fn preview(raw: &str) -> String {
    let v: Option<Value> = serde_json::from_str(raw).ok();
    match v {
        Some(Value::Array(_)) => "array with non-string elements".to_string(),
        Some(other) => format!("{} value", json_type(&other)),
        None => format!("unparseable text {:?}", raw.chars().take(40).collect::<String>()),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn table_maps_both_ways_and_passes_unknowns_through() {
        assert_eq!(api_field_for("blacklist"), "trainingBlacklistLabels");
        assert_eq!(label_type_for("trainingBlacklistLabels"), "blacklist");
        assert_eq!(api_field_for("whitelist"), "whitelist");
        assert_eq!(api_field_for("brandNewType"), "brandNewType");
        assert_eq!(label_type_for("brandNewField"), "brandNewField");
    }

    #[test]
    fn fallback_order_covers_every_mapped_type() {
        for (t, _) in LABEL_FIELDS {
            assert!(LABEL_FALLBACK_ORDER.contains(t), "{t} missing from fallback");
        }
        assert_eq!(LABEL_FALLBACK_ORDER.len(), LABEL_FIELDS.len());
    }

    #[test]
    fn remote_labels_keep_previous_order_and_drop_empty_lists() {
        let r = remote(&[
            ("whitelist", r#"[ "ERROR" ]"#),
            ("trainingBlacklistLabels", r#"["noise"]"#),
            ("featurelist", "[]"),
            ("incidentlist", ""),
        ]);
        let previous = vec![
            LabelSetting::new("blacklist", "[\"old\"]"),
            LabelSetting::new("featurelist", "[\"gone\"]"),
        ];

        let out = labels_from_remote(&r, &previous);
        assert_eq!(
            out,
            vec![
                LabelSetting::new("blacklist", r#"["noise"]"#),
                LabelSetting::new("whitelist", r#"["ERROR"]"#),
            ]
        );
    }

    #[test]
    fn unmapped_remote_fields_append_after_known_types() {
        let r = remote(&[("zetaLabels", r#"["z"]"#), ("whitelist", r#"["w"]"#)]);
        let out = labels_from_remote(&r, &[]);
        let types: Vec<&str> = out.iter().map(|l| l.label_type.as_str()).collect();
        assert_eq!(types, vec!["whitelist", "zetaLabels"]);
    }

    #[test]
    fn tracked_read_ignores_types_not_previously_recorded() {
        let r = remote(&[("whitelist", r#"["w"]"#), ("triagelist", r#"["t"]"#)]);
        let previous = vec![LabelSetting::new("triagelist", "[\"t\"]")];
        let out = tracked_labels_from_remote(&r, &previous);
        assert_eq!(out, vec![LabelSetting::new("triagelist", r#"["t"]"#)]);
    }

    #[test]
    fn validation_reports_the_offending_index() {
        let labels = vec![
            LabelSetting::new("whitelist", r#"["ok"]"#),
            LabelSetting::new("blacklist", r#"[1, 2]"#),
        ];
        match validate_labels(&labels) {
            Err(ReconcileError::SchemaViolation { field, .. }) => {
                assert_eq!(field, "labels[1].rules")
            }
            other => panic!("expected schema violation, got {other:?}"),
        }

        let dup = vec![
            LabelSetting::new("whitelist", "[]"),
            LabelSetting::new("whitelist", "[]"),
        ];
        assert!(matches!(
            validate_labels(&dup),
            Err(ReconcileError::InvalidInput(_))
        ));
    }

    #[test]
    fn removed_types_are_listed_in_previous_order() {
        let previous = vec![
            LabelSetting::new("whitelist", "[]"),
            LabelSetting::new("blacklist", "[]"),
            LabelSetting::new("featurelist", "[]"),
        ];
        let declared = vec![LabelSetting::new("blacklist", "[]")];
        assert_eq!(
            removed_label_types(&previous, &declared),
            vec!["whitelist", "featurelist"]
        );
    }

    #[test]
    fn same_labels_ignores_order_encoding_and_empty_lists() {
        let a = vec![
            LabelSetting::new("whitelist", r#"[ "ERROR" ]"#),
            LabelSetting::new("blacklist", "[]"),
            LabelSetting::new("featurelist", r#"["x"]"#),
        ];
        let b = vec![
            LabelSetting::new("featurelist", r#"["x"]"#),
            LabelSetting::new("whitelist", r#"["ERROR"]"#),
        ];
        assert!(same_labels(&a, &b));

        let c = vec![LabelSetting::new("whitelist", r#"["FATAL"]"#)];
        assert!(!same_labels(&b, &c));
    }
}
