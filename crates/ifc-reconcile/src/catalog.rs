use serde::Deserialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A catalog entry: an opaque backend id plus operator-facing names.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Resolved id: first non-empty of key id, system id, system name.
    pub id: String,
    pub name: String,
    pub display_name: String,
    /// Every non-empty id-like field, in preference order.
    pub candidate_ids: Vec<String>,
    /// Decoded system-level settings, when the platform reported any.
    pub setting: Option<Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            candidate_ids: vec![id.clone()],
            id,
            name: name.into(),
            display_name: String::new(),
            setting: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Operator-facing name: display name, falling back to the system name.
    pub fn display(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Case-insensitive match against any id-like field.
    pub fn has_id(&self, id: &str) -> bool {
        let id = id.trim();
        !id.is_empty() && self.candidate_ids.iter().any(|c| c.eq_ignore_ascii_case(id))
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time list of entities. Built per resolution call, never cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    entities: Vec<Entity>,
    skipped: usize,
}

impl CatalogSnapshot {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities,
            skipped: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from the platform's owned and shared system arrays. Each element
    /// is either a JSON-encoded string or an object. Entries that do not parse
    /// or carry no id are skipped and counted.
    pub fn from_system_arrays(own: &[Value], shared: &[Value]) -> Self {
        let mut snapshot = Self::empty();
        for raw in own.iter().chain(shared.iter()) {
            match normalize(raw) {
                Some(e) => snapshot.entities.push(e),
                None => snapshot.skipped += 1,
            }
        }
        snapshot
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Number of raw entries that could not be turned into entities.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

// ---------------------------------------------------------------------------
// Raw wire-level structs (platform JSON → these → Entity)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
struct RawSystemKey {
    #[serde(rename = "systemName", default)]
    system_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSystem {
    #[serde(rename = "systemKey", default)]
    system_key: Option<RawSystemKey>,
    #[serde(rename = "systemId", default)]
    system_id: Option<String>,
    #[serde(rename = "systemName", default)]
    system_name: Option<String>,
    #[serde(rename = "systemDisplayName", default)]
    system_display_name: Option<String>,
    #[serde(rename = "systemSetting", default)]
    system_setting: Option<Value>,
}

fn normalize(raw: &Value) -> Option<Entity> {
    let sys: RawSystem = match raw {
        Value::String(s) => serde_json::from_str(s).ok()?,
        Value::Object(_) => serde_json::from_value(raw.clone()).ok()?,
        _ => return None,
    };

    let trimmed = |s: &Option<String>| s.as_deref().unwrap_or("").trim().to_string();

    let key_id = sys
        .system_key
        .as_ref()
        .map(|k| trimmed(&k.system_name))
        .unwrap_or_default();
    let system_id = trimmed(&sys.system_id);
    let name = trimmed(&sys.system_name);

    let candidate_ids: Vec<String> = [key_id, system_id, name.clone()]
        .into_iter()
        .filter(|c| !c.is_empty())
        .collect();
    let id = candidate_ids.first()?.clone();

    let setting = match sys.system_setting {
        Some(Value::String(s)) if !s.trim().is_empty() => serde_json::from_str(&s).ok(),
        Some(v @ Value::Object(_)) => Some(v),
        _ => None,
    };

    Some(Entity {
        id,
        name,
        display_name: trimmed(&sys.system_display_name),
        candidate_ids,
        setting,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_prefers_key_then_system_id_then_name() {
        let own = vec![
            json!(r#"{"systemKey":{"systemName":"hash-1"},"systemId":"sid","systemName":"n1"}"#),
            json!({"systemId": "sid-2", "systemName": "n2"}),
            json!({"systemName": "n3", "systemDisplayName": "Three"}),
        ];
        let snap = CatalogSnapshot::from_system_arrays(&own, &[]);
        let ids: Vec<&str> = snap.entities().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["hash-1", "sid-2", "n3"]);
        assert_eq!(snap.entities()[2].display(), "Three");
        assert_eq!(snap.entities()[1].display(), "n2");
    }

    #[test]
    fn unparseable_and_idless_entries_are_skipped() {
        let own = vec![json!("{not json"), json!({"systemDisplayName": "NoId"}), json!(7)];
        let shared = vec![json!({"systemId": "ok"})];
        let snap = CatalogSnapshot::from_system_arrays(&own, &shared);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.skipped(), 3);
    }

    #[test]
    fn encoded_system_setting_is_decoded() {
        let own = vec![json!({
            "systemId": "s1",
            "systemSetting": "{\"systemLevelJWTSecret\":\"abcdef\",\"jwtType\":1}"
        })];
        let snap = CatalogSnapshot::from_system_arrays(&own, &[]);
        let setting = snap.entities()[0].setting.as_ref().unwrap();
        assert_eq!(setting["jwtType"], json!(1));
    }

    #[test]
    fn id_match_is_case_insensitive_over_all_candidates() {
        let own = vec![json!({"systemKey": {"systemName": "ABC"}, "systemId": "xyz"})];
        let snap = CatalogSnapshot::from_system_arrays(&own, &[]);
        let e = &snap.entities()[0];
        assert!(e.has_id("abc"));
        assert!(e.has_id("XYZ"));
        assert!(!e.has_id(""));
    }
}
