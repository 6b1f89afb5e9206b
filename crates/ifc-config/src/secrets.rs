//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `license_key_env: IF_LICENSE_KEY`).
//! - Platform credentials are resolved once at startup via
//!   [`resolve_platform_credentials`] and passed into the transport.
//! - Resource secrets (`password_env`, `app_key_env`, `jwt_secret_env`) are
//!   resolved with [`resolve_named_secret`] when the resource is built.
//! - `Debug` impls on secret-containing structs **redact** values.
//! - Error messages reference the env var **NAME**, never the value.

use anyhow::{bail, Result};
use serde_json::Value;

pub const ENV_BASE_URL: &str = "IF_BASE_URL";
pub const ENV_USERNAME: &str = "IF_USERNAME";
pub const DEFAULT_LICENSE_KEY_ENV: &str = "IF_LICENSE_KEY";

/// Platform endpoint and identity.
///
/// **The license key is redacted in `Debug` output.**
#[derive(Clone)]
pub struct PlatformSecrets {
    pub base_url: String,
    pub username: String,
    pub license_key: String,
}

impl std::fmt::Debug for PlatformSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformSecrets")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("license_key", &"<REDACTED>")
            .finish()
    }
}

/// Read a non-empty string value at `pointer`. Blank counts as absent.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolve a named environment variable. Unset and blank both give `None`.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve the platform base URL, username and license key.
///
/// | Value       | Source (first wins)                                          |
/// |-------------|--------------------------------------------------------------|
/// | base URL    | `IF_BASE_URL`, `/platform/base_url`                          |
/// | username    | `IF_USERNAME`, `/platform/username`                          |
/// | license key | env var named at `/platform/license_key_env` (`IF_LICENSE_KEY`) |
///
/// # Errors
/// Names the missing setting or env var; never includes a secret value.
pub fn resolve_platform_credentials(config_json: &Value) -> Result<PlatformSecrets> {
    let base_url = resolve_env(ENV_BASE_URL).or_else(|| read_str_at(config_json, "/platform/base_url"));
    let username = resolve_env(ENV_USERNAME).or_else(|| read_str_at(config_json, "/platform/username"));
    let key_var = read_str_at(config_json, "/platform/license_key_env")
        .unwrap_or_else(|| DEFAULT_LICENSE_KEY_ENV.to_string());

    let Some(base_url) = base_url else {
        bail!(
            "SECRETS_MISSING: platform base URL not set (env '{}' or /platform/base_url)",
            ENV_BASE_URL
        );
    };
    let Some(username) = username else {
        bail!(
            "SECRETS_MISSING: platform username not set (env '{}' or /platform/username)",
            ENV_USERNAME
        );
    };
    let Some(license_key) = resolve_env(&key_var) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (license key) is not set or empty",
            key_var
        );
    };

    Ok(PlatformSecrets {
        base_url,
        username,
        license_key,
    })
}

/// Resolve a resource secret from the env var `var_name`. `what` names the
/// secret in the error message.
pub fn resolve_named_secret(var_name: &str, what: &str) -> Result<String> {
    let name = var_name.trim();
    if name.is_empty() {
        bail!("SECRETS_MISSING: no env var named for {}", what);
    }
    match resolve_env(name) {
        Some(v) => Ok(v),
        None => bail!(
            "SECRETS_MISSING: required env var '{}' ({}) is not set or empty",
            name,
            what
        ),
    }
}

/// Optional variant: no name given, or the variable unset, gives `None`.
pub fn resolve_optional_secret(var_name: Option<&str>) -> Option<String> {
    var_name.map(str::trim).filter(|n| !n.is_empty()).and_then(resolve_env)
}
