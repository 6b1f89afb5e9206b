//! ifc-config
//!
//! Layered YAML configuration for declared platform resources.
//!
//! - Documents merge in order; later documents override earlier ones
//! - The merged tree is hashed over its canonical JSON form
//! - Secret-looking literals abort the load; YAML names env vars instead
//!   (see [`secrets`])

pub mod secrets;

use anyhow::{bail, Context, Result};
use ifc_reconcile::canonical_value;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// If any leaf string in the effective config starts with one of these, the
/// load aborts with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI style
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "eyJ",        // encoded JWT
];

/// Keys whose literal values are never allowed, whatever they look like.
/// Each has an `*_env` sibling naming the variable to read instead.
const FORBIDDEN_LITERAL_KEYS: &[&str] = &[
    "license_key",
    "password",
    "app_key",
    "jwt_secret",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Declared resources under `/resources`. Missing means none.
    pub fn resources(&self) -> Result<Vec<Value>> {
        match self.config_json.pointer("/resources") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => bail!("CONFIG_INVALID: /resources must be a list"),
        }
    }

    /// Request timeout for platform calls, seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.config_json
            .pointer("/platform/timeout_secs")
            .and_then(Value::as_u64)
            .filter(|s| *s > 0)
            .unwrap_or(30)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonical_value(&merged);
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge key by key; anything else (lists included) is replaced.
fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaves(v, "", &mut leaves);

    for (ptr, leaf) in leaves {
        let Some(s) = leaf.as_str() else {
            continue;
        };
        let key = ptr.rsplit('/').next().unwrap_or("");
        if FORBIDDEN_LITERAL_KEYS.contains(&key) && !s.trim().is_empty() {
            bail!(
                "CONFIG_SECRET_DETECTED leaf={} value=REDACTED (use {}_env to name an env var)",
                ptr,
                key
            );
        }
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn collect_leaves<'a>(v: &'a Value, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                collect_leaves(vv, &format!("{}/{}", prefix, escape_pointer_token(k)), out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaves(vv, &format!("{}/{}", prefix, i), out);
            }
        }
        leaf => {
            let p = if prefix.is_empty() { "/" } else { prefix };
            out.push((p.to_string(), leaf));
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_are_replaced_not_concatenated() {
        let loaded = load_layered_yaml_from_strings(&[
            "resources:\n  - kind: project\n    name: a\n",
            "resources:\n  - kind: project\n    name: b\n",
        ])
        .unwrap();
        let res = loaded.resources().unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0]["name"], "b");
    }

    #[test]
    fn timeout_defaults_to_thirty_seconds() {
        let loaded = load_layered_yaml_from_strings(&["platform: {}\n"]).unwrap();
        assert_eq!(loaded.timeout_secs(), 30);
        let loaded = load_layered_yaml_from_strings(&["platform:\n  timeout_secs: 5\n"]).unwrap();
        assert_eq!(loaded.timeout_secs(), 5);
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        assert_eq!(escape_pointer_token("a/b~c"), "a~1b~0c");
    }
}
