use std::collections::BTreeMap;

use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::ClientError;
use crate::transport::{Method, RemoteResponse, Transport};

const SETTINGS_PATH: &str = "/api/external/v1/watch-tower-setting";
const CREATE_PROJECT_PATH: &str = "/api/v1/check-and-add-custom-project";
const DELETE_PROJECT_PATH: &str = "/api/v1/delete-project";
const KEYWORDS_PATH: &str = "/api/external/v1/projectkeywords";
const SYSTEM_FRAMEWORK_PATH: &str = "/api/external/v1/systemframework";
const SERVICE_INTEGRATION_PATH: &str = "/api/external/v1/service-integration";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Raw system catalog. Elements are JSON-encoded strings or objects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemFramework {
    #[serde(rename = "ownSystemArr", default)]
    pub own: Vec<Value>,
    #[serde(rename = "shareSystemArr", default)]
    pub shared: Vec<Value>,
}

/// Fields of the project-creation form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub system_id: String,
    pub data_type: String,
    pub instance_type: String,
    pub cloud_type: String,
    pub display_name: Option<String>,
    pub insight_agent_type: Option<String>,
    pub creation_type: Option<String>,
}

/// ServiceNow integration as reported by the platform.
#[derive(Clone, Default, PartialEq)]
pub struct ServiceNowRemote {
    pub password: String,
    pub dampening_period: Option<i64>,
    pub app_id: String,
    pub app_key: String,
    pub auth_type: String,
    pub system_ids: Vec<String>,
    pub system_names: Vec<String>,
    pub options: Vec<String>,
    pub content_option: Vec<String>,
}

impl std::fmt::Debug for ServiceNowRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceNowRemote")
            .field("password", &"<REDACTED>")
            .field("dampening_period", &self.dampening_period)
            .field("app_id", &self.app_id)
            .field("app_key", &"<REDACTED>")
            .field("auth_type", &self.auth_type)
            .field("system_ids", &self.system_ids)
            .field("system_names", &self.system_names)
            .field("options", &self.options)
            .field("content_option", &self.content_option)
            .finish()
    }
}

/// ServiceNow integration as written to the platform.
#[derive(Clone, Default, PartialEq)]
pub struct ServiceNowWrite {
    pub service_host: String,
    pub account: String,
    pub password: String,
    pub proxy: String,
    pub dampening_period: i64,
    pub app_id: String,
    pub app_key: String,
    pub auth_type: String,
    pub system_ids: Vec<String>,
    pub options: Vec<String>,
    pub content_option: Vec<String>,
}

impl std::fmt::Debug for ServiceNowWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceNowWrite")
            .field("service_host", &self.service_host)
            .field("account", &self.account)
            .field("password", &"<REDACTED>")
            .field("proxy", &self.proxy)
            .field("dampening_period", &self.dampening_period)
            .field("app_id", &self.app_id)
            .field("app_key", &"<REDACTED>")
            .field("auth_type", &self.auth_type)
            .field("system_ids", &self.system_ids)
            .field("options", &self.options)
            .field("content_option", &self.content_option)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

/// Typed access to the platform endpoints on behalf of one customer.
#[derive(Debug, Clone)]
pub struct PlatformApi<T> {
    transport: T,
    customer: String,
}

impl<T: Transport> PlatformApi<T> {
    pub fn new(transport: T, customer: impl Into<String>) -> Self {
        Self {
            transport,
            customer: customer.into(),
        }
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // --- systems -----------------------------------------------------------

    /// Full system catalog; `None` when the platform reports none.
    pub fn get_system_framework(&self) -> Result<Option<SystemFramework>, ClientError> {
        const OP: &str = "get system framework";
        let path = with_query(
            SYSTEM_FRAMEWORK_PATH,
            &[
                ("customerName", self.customer.as_str()),
                ("needDetail", "true"),
                ("tzOffset", "0"),
            ],
        )?;
        let Some(resp) = self.transport.call(Method::Get, &path, None)?.present(OP)? else {
            return Ok(None);
        };
        resp.json(OP).map(Some)
    }

    /// Write system-level settings (JWT secret and type) for one system.
    pub fn put_system_settings(
        &self,
        system_id: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), ClientError> {
        const OP: &str = "update system settings";
        let key = json!({
            "userName": self.customer,
            "systemName": system_id,
            "environmentName": "All",
        });
        let fields = form(&[
            ("operation", "systemFrameworkSetting"),
            ("systemKey", key.to_string().as_str()),
            ("systemFrameworkSetting", Value::Object(settings.clone()).to_string().as_str()),
        ]);
        let path = with_query(SYSTEM_FRAMEWORK_PATH, &[("tzOffset", "0")])?;
        let resp = self.transport.call_form(Method::Post, &path, &fields)?;
        check_success(resp.expect(OP, &[204])?, OP)
    }

    // --- projects ----------------------------------------------------------

    /// Current project settings; `None` when the project does not exist.
    pub fn get_project_settings(
        &self,
        project: &str,
    ) -> Result<Option<Map<String, Value>>, ClientError> {
        const OP: &str = "get project";
        let list = json!([{ "customerName": self.customer, "projectName": project }]);
        let path = with_query(SETTINGS_PATH, &[("projectList", list.to_string().as_str())])?;
        let Some(resp) = self.transport.call(Method::Get, &path, None)?.present(OP)? else {
            return Ok(None);
        };

        let body: Value = resp.json(OP)?;
        let entry = match body.get("settingList").and_then(|l| l.get(project)) {
            None | Some(Value::Null) => return Ok(None),
            Some(v) => v,
        };

        // The entry is usually a JSON string wrapping a DATA object.
        let wrapper: Value = match entry {
            Value::String(s) => serde_json::from_str(s)
                .map_err(|e| ClientError::decode(OP, format!("project settings: {e}")))?,
            other => other.clone(),
        };
        let settings = match wrapper.get("DATA") {
            Some(Value::Object(data)) => data.clone(),
            _ => match wrapper {
                Value::Object(m) => m,
                _ => return Err(ClientError::decode(OP, "project settings are not an object")),
            },
        };
        Ok(Some(settings))
    }

    pub fn create_project(&self, p: &NewProject) -> Result<(), ClientError> {
        const OP: &str = "create project";
        let mut fields = form(&[
            ("operation", "create"),
            ("projectName", p.name.as_str()),
            ("systemName", p.system_id.as_str()),
            ("instanceType", p.instance_type.as_str()),
            ("dataType", p.data_type.as_str()),
            ("projectCloudType", p.cloud_type.as_str()),
        ]);
        for (k, v) in [
            ("projectDisplayName", &p.display_name),
            ("insightAgentType", &p.insight_agent_type),
            ("projectCreationType", &p.creation_type),
        ] {
            if let Some(v) = v.as_deref().filter(|v| !v.is_empty()) {
                fields.push((k.to_string(), v.to_string()));
            }
        }

        let resp = self
            .transport
            .call_form(Method::Post, CREATE_PROJECT_PATH, &fields)?;
        if resp.status == 400 && already_exists(&resp) {
            info!(project = %p.name, "project already exists; continuing");
            return Ok(());
        }
        check_success(resp.expect(OP, &[204])?, OP)
    }

    /// Apply a settings payload. Any 200 answer counts as applied.
    pub fn update_project_settings(
        &self,
        project: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), ClientError> {
        const OP: &str = "update project settings";
        let path = self.project_settings_path(project)?;
        self.transport
            .call(Method::Post, &path, Some(&Value::Object(settings.clone())))?
            .expect(OP, &[])?;
        Ok(())
    }

    pub fn delete_project(&self, project: &str) -> Result<(), ClientError> {
        const OP: &str = "delete project";
        let fields = form(&[("projectName", project), ("customerName", self.customer.as_str())]);
        self.transport
            .call_form(Method::Post, DELETE_PROJECT_PATH, &fields)?
            .expect(OP, &[404, 405])?;
        Ok(())
    }

    // --- log labels --------------------------------------------------------

    /// Label keywords by API field, each re-encoded as compact JSON.
    pub fn get_log_labels(
        &self,
        project: &str,
    ) -> Result<Option<BTreeMap<String, String>>, ClientError> {
        const OP: &str = "get log labels";
        let path = with_query(KEYWORDS_PATH, &[("projectName", project)])?;
        let Some(resp) = self.transport.call(Method::Get, &path, None)?.present(OP)? else {
            return Ok(None);
        };

        let body: Value = resp.json(OP)?;
        let mut out = BTreeMap::new();
        if let Some(Value::Object(keywords)) = body.get("keywords") {
            for (field, v) in keywords {
                let encoded = match v {
                    // already-encoded lists arrive as strings
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out.insert(field.clone(), encoded);
            }
        }
        Ok(Some(out))
    }

    /// Write one label type's rules. A 204 with no body counts as written.
    pub fn put_log_label(
        &self,
        project: &str,
        label_type: &str,
        rules: &str,
    ) -> Result<(), ClientError> {
        const OP: &str = "update log label";
        let resp = self.post_label(project, label_type, rules)?;
        check_success(resp.expect(OP, &[204])?, OP)
    }

    /// Write an empty rule list for one label type. Absent and unsupported
    /// answers count as cleared.
    pub fn clear_log_label(&self, project: &str, label_type: &str) -> Result<(), ClientError> {
        const OP: &str = "clear log label";
        self.post_label(project, label_type, "[]")?
            .expect(OP, &[204, 404, 405, 501])?;
        Ok(())
    }

    fn post_label(
        &self,
        project: &str,
        label_type: &str,
        rules: &str,
    ) -> Result<RemoteResponse, ClientError> {
        let path = self.project_settings_path(project)?;
        let body = json!({
            "logLabelSettingCreate": {
                "labelType": label_type,
                "logLabelString": rules,
            }
        });
        self.transport.call(Method::Post, &path, Some(&body))
    }

    fn project_settings_path(&self, project: &str) -> Result<String, ClientError> {
        with_query(
            SETTINGS_PATH,
            &[("projectName", project), ("customerName", self.customer.as_str())],
        )
    }

    // --- ServiceNow --------------------------------------------------------

    pub fn get_servicenow(
        &self,
        account: &str,
        service_host: &str,
    ) -> Result<Option<ServiceNowRemote>, ClientError> {
        const OP: &str = "get ServiceNow integration";
        let path = with_query(
            SERVICE_INTEGRATION_PATH,
            &[
                ("tzOffset", "0"),
                ("account", account),
                ("customerName", self.customer.as_str()),
                ("serviceProvider", "ServiceNow"),
                ("operation", "display"),
                ("service_host", service_host),
            ],
        )?;
        let Some(resp) = self.transport.call(Method::Get, &path, None)?.present(OP)? else {
            return Ok(None);
        };

        let body: Value = resp.json(OP)?;
        if body.get("key").is_none() {
            return Ok(None);
        }
        Ok(Some(decode_servicenow(&body)))
    }

    /// Write the integration. With `verify` the platform checks connectivity
    /// first.
    pub fn put_servicenow(&self, w: &ServiceNowWrite, verify: bool) -> Result<(), ClientError> {
        const OP: &str = "configure ServiceNow integration";
        let auth_type = if w.auth_type.is_empty() {
            "basic"
        } else {
            w.auth_type.as_str()
        };

        let mut fields = Vec::new();
        if verify {
            fields.push(("verify".to_string(), "true".to_string()));
        }
        fields.extend(form(&[
            ("operation", "ServiceNow"),
            ("service_host", w.service_host.as_str()),
            ("proxy", w.proxy.as_str()),
            ("account", w.account.as_str()),
            ("password", w.password.as_str()),
            ("dampeningPeriod", w.dampening_period.to_string().as_str()),
            ("appId", w.app_id.as_str()),
            ("appKey", w.app_key.as_str()),
            ("auth_type", auth_type),
            ("customerName", self.customer.as_str()),
            ("systemIds", json!(w.system_ids).to_string().as_str()),
            ("options", json!(w.options).to_string().as_str()),
            ("contentOption", json!(w.content_option).to_string().as_str()),
        ]));

        let resp = self
            .transport
            .call_form(Method::Post, SERVICE_INTEGRATION_PATH, &fields)?;
        check_success(resp.expect(OP, &[204])?, OP)
    }

    pub fn delete_servicenow(&self, account: &str, service_host: &str) -> Result<(), ClientError> {
        const OP: &str = "delete ServiceNow integration";
        let host = service_host.trim();
        if host.is_empty() {
            return Err(ClientError::InvalidInput(
                "service_host is required for deletion".into(),
            ));
        }
        let service_id = format!("ServiceNow:{account}:{host}");
        // The platform routes every integration delete through this provider value.
        let fields = form(&[
            ("serviceProvider", "PagerDuty"),
            ("operation", "delete"),
            ("service_id", service_id.as_str()),
            ("serviceOwner", self.customer.as_str()),
            ("customerName", self.customer.as_str()),
        ]);
        self.transport
            .call_form(Method::Post, SERVICE_INTEGRATION_PATH, &fields)?
            .expect(OP, &[404])?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `path?k=v&...` with form-style percent encoding.
fn with_query(path: &str, params: &[(&str, &str)]) -> Result<String, ClientError> {
    let url = Url::parse_with_params(&format!("http://platform.invalid{path}"), params)
        .map_err(|e| ClientError::InvalidInput(format!("bad request path {path}: {e}")))?;
    Ok(match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    })
}

fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn already_exists(resp: &RemoteResponse) -> bool {
    let text = resp.text().to_lowercase();
    text.contains("already existed") || text.contains("already exists")
}

/// A 200 answer may still carry `{"success": false}`. Non-JSON bodies pass.
fn check_success(resp: RemoteResponse, operation: &str) -> Result<(), ClientError> {
    let Ok(body) = serde_json::from_slice::<Value>(&resp.body) else {
        return Ok(());
    };
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(resp.into_error(operation));
    }
    Ok(())
}

fn decode_servicenow(body: &Value) -> ServiceNowRemote {
    let text = |k: &str| body.get(k).and_then(Value::as_str).unwrap_or("").to_string();

    let mut out = ServiceNowRemote {
        password: text("password"),
        dampening_period: body
            .get("dampeningPeriod")
            .and_then(Value::as_f64)
            .map(|f| f.trunc() as i64),
        app_id: text("appId"),
        app_key: text("appKey"),
        auth_type: text("authType").to_lowercase(),
        ..Default::default()
    };

    if let Some(cfg) = decoded_object(body.get("serviceNowIntegrationConfig")) {
        out.system_ids = string_list(cfg.get("systemIds"));
        out.system_names = string_list(cfg.get("systemNames"));
        out.content_option = string_list(cfg.get("contentOption"));
    }
    out.options = match body.get("options") {
        Some(Value::String(s)) => serde_json::from_str::<Vec<String>>(s).unwrap_or_default(),
        other => string_list(other),
    };
    out
}

fn decoded_object(v: Option<&Value>) -> Option<Map<String, Value>> {
    match v? {
        Value::String(s) if !s.is_empty() => match serde_json::from_str(s) {
            Ok(Value::Object(m)) => Some(m),
            _ => None,
        },
        Value::Object(m) => Some(m.clone()),
        _ => None,
    }
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_form_encoded() {
        let p = with_query("/a/b", &[("projectList", r#"[{"x":"y z"}]"#), ("n", "1")]).unwrap();
        assert_eq!(
            p,
            "/a/b?projectList=%5B%7B%22x%22%3A%22y+z%22%7D%5D&n=1"
        );
    }

    #[test]
    fn servicenow_body_decodes_nested_encodings() {
        let body = json!({
            "key": "k",
            "password": "pw",
            "dampeningPeriod": 3600.0,
            "authType": "OAuth",
            "serviceNowIntegrationConfig": "{\"systemIds\":[\"s1\",\"s2\"],\"contentOption\":[\"RCA\"]}",
            "options": "[\"a\",\"b\"]",
        });
        let r = decode_servicenow(&body);
        assert_eq!(r.dampening_period, Some(3600));
        assert_eq!(r.auth_type, "oauth");
        assert_eq!(r.system_ids, vec!["s1", "s2"]);
        assert_eq!(r.content_option, vec!["RCA"]);
        assert_eq!(r.options, vec!["a", "b"]);
        assert!(r.system_names.is_empty());
    }

    #[test]
    fn success_false_is_an_error_non_json_is_not() {
        assert!(check_success(RemoteResponse::new(200, "ok"), "op").is_ok());
        assert!(check_success(RemoteResponse::new(200, ""), "op").is_ok());
        let err = check_success(
            RemoteResponse::new(200, r#"{"success":false,"message":"nope"}"#),
            "op",
        )
        .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
