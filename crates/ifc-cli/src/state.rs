//! Local state file: the recorded form of every managed resource.
//!
//! Written atomically (sibling temp file, then rename) so an interrupted run
//! leaves either the old or the new file, never a torn one.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use ifc_facade::{RecordedResource, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub kind: ResourceKind,
    pub key: String,
    pub record: Value,
}

impl StateEntry {
    pub fn from_recorded(r: &RecordedResource) -> Result<Self> {
        Ok(Self {
            kind: r.kind(),
            key: r.key(),
            record: r
                .to_value()
                .with_context(|| format!("serialize {} '{}' failed", r.kind(), r.key()))?,
        })
    }

    pub fn to_recorded(&self) -> Result<RecordedResource> {
        RecordedResource::from_value(self.kind, self.record.clone()).with_context(|| {
            format!(
                "STATE_FILE_INVALID: {} '{}' has an unreadable record",
                self.kind, self.key
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub resources: Vec<StateEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: Vec::new(),
        }
    }
}

impl StateFile {
    /// Missing file means empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read state file failed: {}", path.display()))?;
        let state: StateFile = serde_json::from_str(&raw).with_context(|| {
            format!("STATE_FILE_INVALID: {} is not a valid state file", path.display())
        })?;
        if state.version != STATE_VERSION {
            bail!(
                "STATE_FILE_INVALID: unsupported version {} in {} (expected {})",
                state.version,
                path.display(),
                STATE_VERSION
            );
        }
        Ok(state)
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = Utc::now();
        self.resources
            .sort_by(|a, b| (a.kind, &a.key).cmp(&(b.kind, &b.key)));

        let body = serde_json::to_string_pretty(self).context("serialize state failed")?;
        let tmp = tmp_path(path);
        fs::write(&tmp, body)
            .with_context(|| format!("write state temp file failed: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("replace state file failed: {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, kind: ResourceKind, key: &str) -> Option<&StateEntry> {
        self.resources
            .iter()
            .find(|e| e.kind == kind && e.key == key)
    }

    /// Insert or replace the entry with the same kind and key.
    pub fn upsert(&mut self, entry: StateEntry) {
        match self
            .resources
            .iter_mut()
            .find(|e| e.kind == entry.kind && e.key == entry.key)
        {
            Some(slot) => *slot = entry,
            None => self.resources.push(entry),
        }
    }

    pub fn remove(&mut self, kind: ResourceKind, key: &str) -> Option<StateEntry> {
        let idx = self
            .resources
            .iter()
            .position(|e| e.kind == kind && e.key == key)?;
        Some(self.resources.remove(idx))
    }
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_facade::{LabelSetting, LogLabelsRecord};
    use serde_json::json;

    fn entry(kind: ResourceKind, key: &str) -> StateEntry {
        StateEntry {
            kind,
            key: key.to_string(),
            record: json!({}),
        }
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let s = StateFile::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(s.version, STATE_VERSION);
        assert!(s.resources.is_empty());
    }

    #[test]
    fn save_then_load_keeps_entries_sorted_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut s = StateFile::default();
        s.upsert(entry(ResourceKind::ServiceNow, "svc@host"));
        s.upsert(entry(ResourceKind::Project, "p2"));
        s.upsert(entry(ResourceKind::Project, "p1"));
        s.save(&path).unwrap();

        let back = StateFile::load(&path).unwrap();
        let keys: Vec<&str> = back.resources.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["p1", "p2", "svc@host"]);
        assert!(!dir.path().join("state.json.tmp").exists());

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], json!(1));
        assert_eq!(raw["resources"][2]["kind"], json!("servicenow"));
        assert!(raw["updated_at"].is_string());
    }

    #[test]
    fn upsert_replaces_and_remove_drops() {
        let mut s = StateFile::default();
        s.upsert(entry(ResourceKind::Jwt, "Billing"));
        let mut replacement = entry(ResourceKind::Jwt, "Billing");
        replacement.record = json!({"x": 1});
        s.upsert(replacement);
        assert_eq!(s.resources.len(), 1);
        assert_eq!(s.get(ResourceKind::Jwt, "Billing").unwrap().record, json!({"x": 1}));

        assert!(s.remove(ResourceKind::Jwt, "Billing").is_some());
        assert!(s.remove(ResourceKind::Jwt, "Billing").is_none());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"version":2,"updated_at":"2024-01-01T00:00:00Z","resources":[]}"#,
        )
        .unwrap();
        let err = StateFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("STATE_FILE_INVALID"));
    }

    #[test]
    fn entries_convert_to_and_from_records() {
        let r = RecordedResource::LogLabels(LogLabelsRecord {
            project_name: "p1".into(),
            labels: vec![LabelSetting::new("whitelist", r#"["ERROR"]"#)],
        });
        let e = StateEntry::from_recorded(&r).unwrap();
        assert_eq!(e.kind, ResourceKind::LogLabels);
        assert_eq!(e.key, "p1");
        assert_eq!(e.to_recorded().unwrap(), r);
    }
}
