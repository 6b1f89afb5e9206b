//! System-level JWT settings. The "resource" is a pair of fields inside a
//! system's settings; deleting it blanks them.

use ifc_client::Transport;
use ifc_reconcile::{
    check_names, find_entity, merge, resolve_names_to_ids, CatalogSnapshot, Entity,
    SettingsView, JWT_SCHEMA,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::platform::Platform;
use crate::resource::ManagedResource;

pub const DEFAULT_JWT_TYPE: i64 = 1;
pub const MIN_SECRET_LEN: usize = 6;

const SECRET_FIELD: &str = "systemLevelJWTSecret";
const TYPE_FIELD: &str = "jwtType";

#[derive(Clone, PartialEq)]
pub struct JwtDecl {
    pub system_name: String,
    pub jwt_secret: String,
    pub jwt_type: i64,
}

impl JwtDecl {
    pub fn new(system_name: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            system_name: system_name.into(),
            jwt_secret: jwt_secret.into(),
            jwt_type: DEFAULT_JWT_TYPE,
        }
    }
}

impl std::fmt::Debug for JwtDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecl")
            .field("system_name", &self.system_name)
            .field("jwt_secret", &"<REDACTED>")
            .field("jwt_type", &self.jwt_type)
            .finish()
    }
}

/// Persisted JWT state. The secret is kept so drift can be detected.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtRecord {
    pub system_name: String,
    #[serde(default)]
    pub system_id: String,
    pub jwt_secret: String,
    pub jwt_type: i64,
}

impl std::fmt::Debug for JwtRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtRecord")
            .field("system_name", &self.system_name)
            .field("system_id", &self.system_id)
            .field("jwt_secret", &"<REDACTED>")
            .field("jwt_type", &self.jwt_type)
            .finish()
    }
}

pub struct JwtResource<'a, T> {
    platform: &'a Platform<T>,
}

impl<'a, T: Transport> JwtResource<'a, T> {
    pub(crate) fn new(platform: &'a Platform<T>) -> Self {
        Self { platform }
    }

    fn write(&self, decl: &JwtDecl) -> Result<JwtRecord, Error> {
        validate(decl)?;
        let catalog = self.platform.catalog()?;
        let ids = resolve_names_to_ids(std::slice::from_ref(&decl.system_name), &catalog)?;
        let system_id = ids.into_iter().next().unwrap_or_default();

        let declared = declared_settings(decl);
        let remote = entity_settings(find_entity(&catalog, &system_id));
        let outcome = merge(&JWT_SCHEMA, &remote, &declared)?;
        self.platform
            .api()
            .put_system_settings(&system_id, &outcome.outbound.to_wire())?;

        let recorded = match self.platform.catalog() {
            Ok(fresh) => match find_entity(&fresh, &system_id).and_then(|e| e.setting.as_ref()) {
                Some(Value::Object(setting)) => merge(&JWT_SCHEMA, setting, &declared)?.recorded,
                _ => {
                    warn!(system = %decl.system_name, "no system settings on read-back; recording declared values");
                    outcome.recorded
                }
            },
            Err(e) => {
                warn!(system = %decl.system_name, error = %e, "read-back failed; recording declared values");
                outcome.recorded
            }
        };

        Ok(JwtRecord {
            system_name: decl.system_name.clone(),
            system_id,
            jwt_secret: secret_of(&recorded).to_string(),
            jwt_type: type_of(&recorded),
        })
    }
}

impl<T: Transport> ManagedResource for JwtResource<'_, T> {
    type Declared = JwtDecl;
    type Recorded = JwtRecord;

    fn key(recorded: &JwtRecord) -> String {
        recorded.system_name.clone()
    }

    fn create(&self, decl: &JwtDecl) -> Result<JwtRecord, Error> {
        info!(system = %decl.system_name, "configuring system JWT");
        self.write(decl)
    }

    fn read(&self, previous: &JwtRecord) -> Result<Option<JwtRecord>, Error> {
        let catalog = self.platform.catalog()?;
        let Some(entity) = locate(&catalog, previous) else {
            info!(system = %previous.system_name, "system no longer in catalog");
            return Ok(None);
        };
        let Some(Value::Object(setting)) = &entity.setting else {
            return Ok(None);
        };

        let recorded = merge(&JWT_SCHEMA, setting, &Map::new())?.recorded;
        let secret = secret_of(&recorded);
        if secret.is_empty() {
            return Ok(None);
        }

        // keep the operator's spelling while it still names the same system
        let same_name = [entity.display(), entity.name.as_str()]
            .iter()
            .any(|n| n.trim().eq_ignore_ascii_case(previous.system_name.trim()));
        let system_name = if same_name {
            previous.system_name.clone()
        } else {
            entity.display().to_string()
        };

        Ok(Some(JwtRecord {
            system_name,
            system_id: entity.id.clone(),
            jwt_secret: secret.to_string(),
            jwt_type: type_of(&recorded),
        }))
    }

    fn update(&self, decl: &JwtDecl, _previous: &JwtRecord) -> Result<JwtRecord, Error> {
        info!(system = %decl.system_name, "updating system JWT");
        self.write(decl)
    }

    /// Blank the secret and zero the type. A system that has vanished
    /// counts as already cleared.
    fn delete(&self, previous: &JwtRecord) -> Result<(), Error> {
        info!(system = %previous.system_name, "clearing system JWT");
        let catalog = self.platform.catalog()?;
        let Some(entity) = locate(&catalog, previous) else {
            return Ok(());
        };
        let mut cleared = Map::new();
        cleared.insert(SECRET_FIELD.to_string(), Value::String(String::new()));
        cleared.insert(TYPE_FIELD.to_string(), Value::from(0));
        self.platform
            .api()
            .put_system_settings(&entity.id, &cleared)?;
        Ok(())
    }

    fn import(&self, system_name: &str) -> Result<Option<JwtRecord>, Error> {
        let system_name = system_name.trim().to_string();
        check_names(std::slice::from_ref(&system_name))?;
        self.read(&JwtRecord {
            system_name,
            ..Default::default()
        })
    }
}

pub(crate) fn in_sync(decl: &JwtDecl, recorded: &JwtRecord) -> bool {
    let same_system = decl.system_name.trim().eq_ignore_ascii_case(recorded.system_name.trim());
    same_system
        && decl.jwt_secret == recorded.jwt_secret
        && decl.jwt_type == recorded.jwt_type
}

fn validate(decl: &JwtDecl) -> Result<(), Error> {
    check_names(std::slice::from_ref(&decl.system_name))?;
    if decl.jwt_secret.chars().count() < MIN_SECRET_LEN {
        return Err(Error::invalid_input(format!(
            "jwt secret for '{}' must be at least {MIN_SECRET_LEN} characters",
            decl.system_name
        )));
    }
    Ok(())
}

/// Find the recorded system: by id first, then leniently by name.
fn locate<'c>(catalog: &'c CatalogSnapshot, previous: &JwtRecord) -> Option<&'c Entity> {
    if let Some(e) = find_entity(catalog, &previous.system_id) {
        return Some(e);
    }
    match resolve_names_to_ids(std::slice::from_ref(&previous.system_name), catalog) {
        Ok(ids) => ids.first().and_then(|id| find_entity(catalog, id)),
        Err(e) => {
            debug!(system = %previous.system_name, error = %e, "system not resolved");
            None
        }
    }
}

fn declared_settings(decl: &JwtDecl) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert(SECRET_FIELD.to_string(), Value::String(decl.jwt_secret.clone()));
    m.insert(TYPE_FIELD.to_string(), Value::from(decl.jwt_type));
    m
}

fn entity_settings(entity: Option<&Entity>) -> Map<String, Value> {
    match entity.and_then(|e| e.setting.as_ref()) {
        Some(Value::Object(m)) => m.clone(),
        _ => Map::new(),
    }
}

fn secret_of(view: &SettingsView) -> &str {
    view.get(SECRET_FIELD)
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn type_of(view: &SettingsView) -> i64 {
    view.get(TYPE_FIELD)
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_JWT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secret_is_rejected() {
        let err = validate(&JwtDecl::new("Billing", "12345")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        assert!(validate(&JwtDecl::new("Billing", "123456")).is_ok());
    }

    #[test]
    fn blank_system_name_is_rejected() {
        let err = validate(&JwtDecl::new("  ", "long-enough")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }

    #[test]
    fn debug_output_redacts_the_secret() {
        let s = format!("{:?}", JwtDecl::new("Billing", "hunter22"));
        assert!(!s.contains("hunter22"));
        let r = JwtRecord {
            jwt_secret: "hunter22".into(),
            ..Default::default()
        };
        assert!(!format!("{r:?}").contains("hunter22"));
    }

    #[test]
    fn missing_type_defaults() {
        let view = merge(&JWT_SCHEMA, &Map::new(), &Map::new()).unwrap().recorded;
        assert_eq!(type_of(&view), DEFAULT_JWT_TYPE);
        assert_eq!(secret_of(&view), "");
    }
}
