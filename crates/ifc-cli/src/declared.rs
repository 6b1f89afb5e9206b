//! Declared resources from the `/resources` list of the layered config.
//!
//! Secrets are never literal in YAML: `jwt_secret_env`, `password_env` and
//! `app_key_env` name the environment variables to read.

use anyhow::{bail, Context, Result};
use ifc_config::secrets::resolve_named_secret;
use ifc_facade::{
    DeclaredResource, JwtDecl, LogLabelsDecl, ProjectDecl, ResourceKind, ServiceNowDecl,
    DEFAULT_JWT_TYPE,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize)]
struct JwtEntry {
    system_name: String,
    jwt_secret_env: String,
    #[serde(default = "default_jwt_type")]
    jwt_type: i64,
}

fn default_jwt_type() -> i64 {
    DEFAULT_JWT_TYPE
}

#[derive(Debug, Deserialize)]
struct ServiceNowEntry {
    service_host: String,
    account: String,
    password_env: String,
    #[serde(default)]
    proxy: Option<String>,
    #[serde(default)]
    dampening_period: Option<i64>,
    #[serde(default)]
    app_id: Option<String>,
    #[serde(default)]
    app_key_env: Option<String>,
    #[serde(default)]
    auth_type: Option<String>,
    #[serde(default)]
    system_names: Vec<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    content_option: Vec<String>,
}

/// Parse one `/resources` entry. The `kind` field selects the shape.
pub fn parse_entry(idx: usize, v: &Value) -> Result<DeclaredResource> {
    let kind_str = v
        .get("kind")
        .and_then(Value::as_str)
        .with_context(|| format!("CONFIG_INVALID: /resources/{idx} has no 'kind'"))?;
    let kind: ResourceKind = kind_str
        .parse()
        .with_context(|| format!("CONFIG_INVALID: /resources/{idx}"))?;

    let ctx = || format!("CONFIG_INVALID: /resources/{idx} is not a valid {kind}");
    Ok(match kind {
        ResourceKind::Project => {
            DeclaredResource::Project(serde_json::from_value::<ProjectDecl>(v.clone()).with_context(ctx)?)
        }
        ResourceKind::LogLabels => DeclaredResource::LogLabels(
            serde_json::from_value::<LogLabelsDecl>(v.clone()).with_context(ctx)?,
        ),
        ResourceKind::Jwt => {
            let e: JwtEntry = serde_json::from_value(v.clone()).with_context(ctx)?;
            let what = format!("jwt secret for system '{}'", e.system_name);
            DeclaredResource::Jwt(JwtDecl {
                jwt_secret: resolve_named_secret(&e.jwt_secret_env, &what)?,
                system_name: e.system_name,
                jwt_type: e.jwt_type,
            })
        }
        ResourceKind::ServiceNow => {
            let e: ServiceNowEntry = serde_json::from_value(v.clone()).with_context(ctx)?;
            let who = format!("{}@{}", e.account, e.service_host);
            let password = resolve_named_secret(&e.password_env, &format!("password for {who}"))?;
            let app_key = match e.app_key_env.as_deref() {
                Some(var) => Some(resolve_named_secret(var, &format!("app key for {who}"))?),
                None => None,
            };
            DeclaredResource::ServiceNow(ServiceNowDecl {
                service_host: e.service_host,
                account: e.account,
                password,
                proxy: e.proxy,
                dampening_period: e.dampening_period,
                app_id: e.app_id,
                app_key,
                auth_type: e.auth_type,
                system_names: e.system_names,
                options: e.options,
                content_option: e.content_option,
            })
        }
    })
}

/// Parse every entry; two entries with the same kind and key are rejected.
pub fn parse_all(entries: &[Value]) -> Result<Vec<DeclaredResource>> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(entries.len());
    for (idx, v) in entries.iter().enumerate() {
        let d = parse_entry(idx, v)?;
        if !seen.insert((d.kind(), d.key())) {
            bail!(
                "CONFIG_DUPLICATE_RESOURCE: {} '{}' is declared more than once",
                d.kind(),
                d.key()
            );
        }
        out.push(d);
    }
    Ok(out)
}
