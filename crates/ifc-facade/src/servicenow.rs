//! ServiceNow integration, keyed by `account@service_host`.

use std::collections::{BTreeMap, BTreeSet};

use ifc_client::{ServiceNowRemote, ServiceNowWrite, Transport};
use ifc_reconcile::{align, resolve_ids_to_names, resolve_names_to_ids};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Error;
use crate::platform::Platform;
use crate::resource::ManagedResource;

pub const DEFAULT_DAMPENING_PERIOD: i64 = 3600;

const AUTH_BASIC: &str = "basic";
const AUTH_OAUTH: &str = "oauth";

#[derive(Clone, Default, PartialEq)]
pub struct ServiceNowDecl {
    pub service_host: String,
    pub account: String,
    pub password: String,
    pub proxy: Option<String>,
    pub dampening_period: Option<i64>,
    pub app_id: Option<String>,
    pub app_key: Option<String>,
    /// `basic` (default) or `oauth`.
    pub auth_type: Option<String>,
    pub system_names: Vec<String>,
    pub options: Vec<String>,
    pub content_option: Vec<String>,
}

impl std::fmt::Debug for ServiceNowDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceNowDecl")
            .field("service_host", &self.service_host)
            .field("account", &self.account)
            .field("password", &"<REDACTED>")
            .field("proxy", &self.proxy)
            .field("dampening_period", &self.dampening_period)
            .field("app_id", &self.app_id)
            .field("app_key", &self.app_key.as_ref().map(|_| "<REDACTED>"))
            .field("auth_type", &self.auth_type)
            .field("system_names", &self.system_names)
            .field("options", &self.options)
            .field("content_option", &self.content_option)
            .finish()
    }
}

/// Persisted integration state. `system_ids[i]` pairs with `system_names[i]`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceNowRecord {
    pub service_host: String,
    pub account: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dampening_period: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    pub auth_type: String,
    #[serde(default)]
    pub system_ids: Vec<String>,
    #[serde(default)]
    pub system_names: Vec<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub content_option: Vec<String>,
}

impl ServiceNowRecord {
    pub fn key(&self) -> String {
        format!("{}@{}", self.account, self.service_host)
    }
}

impl std::fmt::Debug for ServiceNowRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceNowRecord")
            .field("service_host", &self.service_host)
            .field("account", &self.account)
            .field("password", &"<REDACTED>")
            .field("proxy", &self.proxy)
            .field("dampening_period", &self.dampening_period)
            .field("app_id", &self.app_id)
            .field("app_key", &self.app_key.as_ref().map(|_| "<REDACTED>"))
            .field("auth_type", &self.auth_type)
            .field("system_ids", &self.system_ids)
            .field("system_names", &self.system_names)
            .field("options", &self.options)
            .field("content_option", &self.content_option)
            .finish()
    }
}

pub struct ServiceNowResource<'a, T> {
    platform: &'a Platform<T>,
}

impl<'a, T: Transport> ServiceNowResource<'a, T> {
    pub(crate) fn new(platform: &'a Platform<T>) -> Self {
        Self { platform }
    }

    /// Verify connectivity, then store. Returns the record as written.
    fn write(&self, decl: &ServiceNowDecl) -> Result<ServiceNowRecord, Error> {
        let auth_type = validate(decl)?;

        let ids = if decl.system_names.is_empty() {
            Vec::new()
        } else {
            let catalog = self.platform.catalog()?;
            resolve_names_to_ids(&decl.system_names, &catalog)?
        };
        let (system_ids, system_names) = pair_unique(&ids, &decl.system_names);

        let record = ServiceNowRecord {
            service_host: decl.service_host.trim().to_string(),
            account: decl.account.trim().to_string(),
            password: decl.password.clone(),
            proxy: decl.proxy.clone().filter(|p| !p.trim().is_empty()),
            dampening_period: decl.dampening_period,
            app_id: decl.app_id.clone().filter(|s| !s.is_empty()),
            app_key: decl.app_key.clone().filter(|s| !s.is_empty()),
            auth_type: auth_type.to_string(),
            system_ids,
            system_names,
            options: decl.options.clone(),
            content_option: decl.content_option.clone(),
        };

        let wire = to_write(&record);
        let api = self.platform.api();
        api.put_servicenow(&wire, true)?;
        api.put_servicenow(&wire, false)?;

        match self.read(&record) {
            Ok(Some(fresh)) => Ok(fresh),
            Ok(None) => {
                warn!(integration = %record.key(), "integration missing on read-back; recording declared values");
                Ok(record)
            }
            Err(e) => {
                warn!(integration = %record.key(), error = %e, "read-back failed; recording declared values");
                Ok(record)
            }
        }
    }

    /// Names for `ids`: the previous pairing first, then the platform's own
    /// pairing, then the catalog. A catalog failure leaves raw ids.
    fn names_for(
        &self,
        ids: &[String],
        previous: &ServiceNowRecord,
        remote: &ServiceNowRemote,
    ) -> Vec<String> {
        let mut known: BTreeMap<&str, &str> = BTreeMap::new();
        for (id, name) in remote.system_ids.iter().zip(&remote.system_names) {
            if !name.is_empty() {
                known.insert(id.as_str(), name.as_str());
            }
        }
        for (id, name) in previous.system_ids.iter().zip(&previous.system_names) {
            known.insert(id.as_str(), name.as_str());
        }

        let unknown: Vec<String> = ids
            .iter()
            .filter(|id| !known.contains_key(id.as_str()))
            .cloned()
            .collect();
        let resolved: BTreeMap<String, String> = if unknown.is_empty() {
            BTreeMap::new()
        } else {
            match self.platform.catalog() {
                Ok(catalog) => unknown
                    .iter()
                    .cloned()
                    .zip(resolve_ids_to_names(&unknown, &catalog))
                    .collect(),
                Err(e) => {
                    warn!(integration = %previous.key(), error = %e, "catalog fetch failed; recording raw system ids");
                    BTreeMap::new()
                }
            }
        };

        ids.iter()
            .map(|id| {
                known
                    .get(id.as_str())
                    .map(|n| n.to_string())
                    .or_else(|| resolved.get(id).cloned())
                    .unwrap_or_else(|| id.clone())
            })
            .collect()
    }
}

impl<T: Transport> ManagedResource for ServiceNowResource<'_, T> {
    type Declared = ServiceNowDecl;
    type Recorded = ServiceNowRecord;

    fn key(recorded: &ServiceNowRecord) -> String {
        recorded.key()
    }

    fn create(&self, decl: &ServiceNowDecl) -> Result<ServiceNowRecord, Error> {
        info!(account = %decl.account, host = %decl.service_host, "creating ServiceNow integration");
        self.write(decl)
    }

    fn read(&self, previous: &ServiceNowRecord) -> Result<Option<ServiceNowRecord>, Error> {
        let Some(remote) = self
            .platform
            .api()
            .get_servicenow(&previous.account, &previous.service_host)?
        else {
            return Ok(None);
        };

        let remote_ids: Vec<String> = remote
            .system_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        let system_ids = ordered(&previous.system_ids, &remote_ids);
        let system_names = self.names_for(&system_ids, previous, &remote);

        Ok(Some(ServiceNowRecord {
            service_host: previous.service_host.clone(),
            account: previous.account.clone(),
            // the platform masks secrets; keep what was written
            password: previous.password.clone(),
            app_key: previous.app_key.clone(),
            proxy: previous.proxy.clone(),
            dampening_period: remote.dampening_period.or(previous.dampening_period),
            app_id: Some(remote.app_id.clone())
                .filter(|s| !s.is_empty())
                .or_else(|| previous.app_id.clone()),
            auth_type: if remote.auth_type.is_empty() {
                previous.auth_type.clone()
            } else {
                remote.auth_type.clone()
            },
            system_ids,
            system_names,
            options: ordered(&previous.options, &remote.options),
            content_option: ordered(&previous.content_option, &remote.content_option),
        }))
    }

    /// App id and key fall back to the previous values when not declared.
    fn update(
        &self,
        decl: &ServiceNowDecl,
        previous: &ServiceNowRecord,
    ) -> Result<ServiceNowRecord, Error> {
        info!(account = %decl.account, host = %decl.service_host, "updating ServiceNow integration");
        let mut decl = decl.clone();
        if decl.app_id.as_deref().map_or(true, str::is_empty) {
            decl.app_id = previous.app_id.clone();
        }
        if decl.app_key.as_deref().map_or(true, str::is_empty) {
            decl.app_key = previous.app_key.clone();
        }
        self.write(&decl)
    }

    fn delete(&self, previous: &ServiceNowRecord) -> Result<(), Error> {
        info!(account = %previous.account, host = %previous.service_host, "deleting ServiceNow integration");
        self.platform
            .api()
            .delete_servicenow(&previous.account, &previous.service_host)?;
        Ok(())
    }

    fn import(&self, key: &str) -> Result<Option<ServiceNowRecord>, Error> {
        let (account, service_host) = parse_key(key)?;
        let skeleton = ServiceNowRecord {
            account,
            service_host,
            auth_type: AUTH_BASIC.to_string(),
            ..Default::default()
        };
        self.read(&skeleton)
    }
}

/// Split `account@service_host`. The host is the part after the last `@`.
pub fn parse_key(key: &str) -> Result<(String, String), Error> {
    let bad = || Error::invalid_input(format!("expected account@service_host, got '{key}'"));
    let (account, host) = key.trim().rsplit_once('@').ok_or_else(bad)?;
    let (account, host) = (account.trim(), host.trim());
    if account.is_empty() || host.is_empty() {
        return Err(bad());
    }
    Ok((account.to_string(), host.to_string()))
}

/// True when a write would store what the record already holds. Optional
/// credentials only count when declared.
pub(crate) fn in_sync(decl: &ServiceNowDecl, recorded: &ServiceNowRecord) -> bool {
    let Ok(auth_type) = validate(decl) else {
        return false;
    };
    let declared_opt = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
    let credentials_match = [
        (declared_opt(&decl.app_id), &recorded.app_id),
        (declared_opt(&decl.app_key), &recorded.app_key),
    ]
    .into_iter()
    .all(|(d, r)| d.is_none() || d.as_ref() == r.as_ref());

    let proxy = |p: Option<&str>| p.map(str::trim).unwrap_or("").to_string();
    let folded = |names: &[String]| -> BTreeSet<String> {
        names.iter().map(|n| n.trim().to_lowercase()).collect()
    };
    let set = |v: &[String]| -> BTreeSet<String> { v.iter().cloned().collect() };

    decl.account.trim() == recorded.account
        && decl.service_host.trim() == recorded.service_host
        && decl.password == recorded.password
        && proxy(decl.proxy.as_deref()) == proxy(recorded.proxy.as_deref())
        && decl.dampening_period.unwrap_or(DEFAULT_DAMPENING_PERIOD)
            == recorded.dampening_period.unwrap_or(DEFAULT_DAMPENING_PERIOD)
        && credentials_match
        && auth_type.eq_ignore_ascii_case(&recorded.auth_type)
        && folded(&decl.system_names) == folded(&recorded.system_names)
        && set(&decl.options) == set(&recorded.options)
        && set(&decl.content_option) == set(&recorded.content_option)
}

/// Check required fields and return the normalized auth type.
fn validate(decl: &ServiceNowDecl) -> Result<&'static str, Error> {
    if decl.service_host.trim().is_empty() {
        return Err(Error::invalid_input("service_host cannot be empty"));
    }
    if decl.account.trim().is_empty() {
        return Err(Error::invalid_input("account cannot be empty"));
    }
    let auth = match decl.auth_type.as_deref().map(str::trim) {
        None | Some("") => AUTH_BASIC,
        Some(a) if a.eq_ignore_ascii_case(AUTH_BASIC) => AUTH_BASIC,
        Some(a) if a.eq_ignore_ascii_case(AUTH_OAUTH) => AUTH_OAUTH,
        Some(other) => {
            return Err(Error::invalid_input(format!(
                "auth_type must be basic or oauth, got '{other}'"
            )))
        }
    };
    if auth == AUTH_OAUTH {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        if blank(&decl.app_id) || blank(&decl.app_key) {
            return Err(Error::invalid_input("oauth requires app_id and app_key"));
        }
    }
    Ok(auth)
}

/// Drop repeated ids, keeping the first name paired with each.
fn pair_unique(ids: &[String], names: &[String]) -> (Vec<String>, Vec<String>) {
    let mut seen = BTreeSet::new();
    let mut out_ids = Vec::new();
    let mut out_names = Vec::new();
    for (id, name) in ids.iter().zip(names) {
        if seen.insert(id.as_str()) {
            out_ids.push(id.clone());
            out_names.push(name.trim().to_string());
        }
    }
    (out_ids, out_names)
}

/// `current` reordered to follow `previous`; new entries keep platform order.
fn ordered(previous: &[String], current: &[String]) -> Vec<String> {
    let valid: BTreeSet<String> = current.iter().cloned().collect();
    align(previous, &valid, current)
}

fn to_write(r: &ServiceNowRecord) -> ServiceNowWrite {
    ServiceNowWrite {
        service_host: r.service_host.clone(),
        account: r.account.clone(),
        password: r.password.clone(),
        proxy: r.proxy.clone().unwrap_or_default(),
        dampening_period: r.dampening_period.unwrap_or(DEFAULT_DAMPENING_PERIOD),
        app_id: r.app_id.clone().unwrap_or_default(),
        app_key: r.app_key.clone().unwrap_or_default(),
        auth_type: r.auth_type.clone(),
        system_ids: r.system_ids.clone(),
        options: r.options.clone(),
        content_option: r.content_option.clone(),
    }
}
