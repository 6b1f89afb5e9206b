//! In-memory platform for scenario tests.
//!
//! Implements [`Transport`] by routing each call to a small model of the
//! platform: systems with their settings, projects with settings and label
//! keywords, and ServiceNow integrations. Every call is recorded. Failures
//! can be injected per method and path. No network I/O.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use ifc_client::{ClientError, Method, RemoteResponse, Transport};
use ifc_reconcile::api_field_for;
use reqwest::Url;
use serde_json::{json, Map, Value};

pub const SETTINGS_PATH: &str = "/api/external/v1/watch-tower-setting";
pub const CREATE_PROJECT_PATH: &str = "/api/v1/check-and-add-custom-project";
pub const DELETE_PROJECT_PATH: &str = "/api/v1/delete-project";
pub const KEYWORDS_PATH: &str = "/api/external/v1/projectkeywords";
pub const SYSTEM_FRAMEWORK_PATH: &str = "/api/external/v1/systemframework";
pub const SERVICE_INTEGRATION_PATH: &str = "/api/external/v1/service-integration";

/// What the platform reports in place of stored secrets.
pub const MASK: &str = "******";

/// One call as the platform saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub form: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct Failure {
    method: Method,
    path: String,
    status: u16,
    body: String,
    /// `None` = every matching call fails.
    remaining: Option<usize>,
}

#[derive(Debug, Clone, Default)]
struct FakeSystem {
    id: String,
    name: String,
    display_name: String,
    setting: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct FakeIntegration {
    password: String,
    dampening_period: i64,
    app_id: String,
    app_key: String,
    auth_type: String,
    system_ids: Vec<String>,
    options: Vec<String>,
    content_option: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    systems: Vec<FakeSystem>,
    projects: BTreeMap<String, Map<String, Value>>,
    /// project -> API field -> rules
    keywords: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// (account, host) -> integration
    integrations: BTreeMap<(String, String), FakeIntegration>,
    calls: Vec<RecordedCall>,
    failures: Vec<Failure>,
}

#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<State>,
    label_writers: AtomicUsize,
    peak_label_writers: AtomicUsize,
    label_write_delay: Duration,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each label write this long, so overlapping writers would show up
    /// in [`FakePlatform::peak_label_writers`].
    pub fn with_label_write_delay(mut self, delay: Duration) -> Self {
        self.label_write_delay = delay;
        self
    }

    pub fn with_system(self, id: &str, display_name: &str) -> Self {
        self.add_system(id, &format!("{id}-name"), display_name);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- seeding and inspection -------------------------------------------

    pub fn add_system(&self, id: &str, name: &str, display_name: &str) {
        self.state().systems.push(FakeSystem {
            id: id.to_string(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            setting: Map::new(),
        });
    }

    pub fn remove_system(&self, id: &str) {
        self.state().systems.retain(|s| s.id != id);
    }

    pub fn system_setting(&self, id: &str) -> Option<Map<String, Value>> {
        self.state()
            .systems
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.setting.clone())
    }

    pub fn set_system_setting(&self, id: &str, key: &str, value: Value) {
        if let Some(s) = self.state().systems.iter_mut().find(|s| s.id == id) {
            s.setting.insert(key.to_string(), value);
        }
    }

    pub fn project(&self, name: &str) -> Option<Map<String, Value>> {
        self.state().projects.get(name).cloned()
    }

    /// Seed a bare project, as if created outside this tool.
    pub fn add_project(&self, name: &str) {
        let mut settings = Map::new();
        settings.insert("projectName".to_string(), Value::String(name.to_string()));
        self.state().projects.insert(name.to_string(), settings);
    }

    pub fn set_project_setting(&self, name: &str, key: &str, value: Value) {
        if let Some(p) = self.state().projects.get_mut(name) {
            p.insert(key.to_string(), value);
        }
    }

    pub fn remove_project(&self, name: &str) {
        let mut st = self.state();
        st.projects.remove(name);
        st.keywords.remove(name);
    }

    /// Label rules by API field.
    pub fn keywords(&self, project: &str) -> BTreeMap<String, Vec<String>> {
        self.state().keywords.get(project).cloned().unwrap_or_default()
    }

    pub fn set_keywords(&self, project: &str, api_field: &str, rules: &[&str]) {
        self.state()
            .keywords
            .entry(project.to_string())
            .or_default()
            .insert(
                api_field.to_string(),
                rules.iter().map(|r| r.to_string()).collect(),
            );
    }

    pub fn has_integration(&self, account: &str, host: &str) -> bool {
        self.state()
            .integrations
            .contains_key(&(account.to_string(), host.to_string()))
    }

    pub fn integration_system_ids(&self, account: &str, host: &str) -> Option<Vec<String>> {
        self.state()
            .integrations
            .get(&(account.to_string(), host.to_string()))
            .map(|i| i.system_ids.clone())
    }

    /// Overwrite the order the platform reports integration systems in.
    pub fn set_integration_system_ids(&self, account: &str, host: &str, ids: &[&str]) {
        if let Some(i) = self
            .state()
            .integrations
            .get_mut(&(account.to_string(), host.to_string()))
        {
            i.system_ids = ids.iter().map(|s| s.to_string()).collect();
        }
    }

    // --- failure injection -------------------------------------------------

    /// Every matching call answers `status` with `body`.
    pub fn fail(&self, method: Method, path: &str, status: u16, body: &str) {
        self.push_failure(method, path, status, body, None);
    }

    /// The next `times` matching calls answer `status` with `body`.
    pub fn fail_times(&self, method: Method, path: &str, status: u16, body: &str, times: usize) {
        self.push_failure(method, path, status, body, Some(times));
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    fn push_failure(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: &str,
        remaining: Option<usize>,
    ) {
        self.state().failures.push(Failure {
            method,
            path: path.to_string(),
            status,
            body: body.to_string(),
            remaining,
        });
    }

    // --- call log ----------------------------------------------------------

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .cloned()
            .collect()
    }

    /// Label writes, as `(project, labelType, rules)` in arrival order.
    pub fn label_writes(&self) -> Vec<(String, String, String)> {
        self.calls_to(Method::Post, SETTINGS_PATH)
            .into_iter()
            .filter_map(|c| {
                let create = c.body.as_ref()?.get("logLabelSettingCreate")?.clone();
                Some((
                    c.query.get("projectName").cloned().unwrap_or_default(),
                    create.get("labelType")?.as_str()?.to_string(),
                    create.get("logLabelString")?.as_str()?.to_string(),
                ))
            })
            .collect()
    }

    /// Most label writes ever in flight at once.
    pub fn peak_label_writers(&self) -> usize {
        self.peak_label_writers.load(Ordering::SeqCst)
    }

    // --- routing -----------------------------------------------------------

    /// Record the call and return an injected failure if one matches.
    fn intercept(&self, call: RecordedCall) -> Option<RemoteResponse> {
        let mut st = self.state();
        let hit = st.failures.iter_mut().position(|f| {
            f.method == call.method && f.path == call.path && f.remaining != Some(0)
        });
        st.calls.push(call);
        let f = &mut st.failures[hit?];
        if let Some(n) = f.remaining.as_mut() {
            *n -= 1;
        }
        Some(RemoteResponse::new(f.status, f.body.clone()))
    }

    fn route_json(&self, call: &RecordedCall) -> RemoteResponse {
        match (call.method, call.path.as_str()) {
            (Method::Get, SYSTEM_FRAMEWORK_PATH) => self.get_systems(),
            (Method::Get, SETTINGS_PATH) => self.get_project(call),
            (Method::Post, SETTINGS_PATH) => {
                let project = call.query.get("projectName").cloned().unwrap_or_default();
                match call.body.as_ref().and_then(|b| b.get("logLabelSettingCreate")) {
                    Some(create) => self.put_label(&project, create),
                    None => self.put_project(&project, call.body.as_ref()),
                }
            }
            (Method::Get, KEYWORDS_PATH) => self.get_keywords(call),
            (Method::Get, SERVICE_INTEGRATION_PATH) => self.get_integration(call),
            _ => not_found(),
        }
    }

    fn route_form(&self, call: &RecordedCall) -> RemoteResponse {
        let op = call.form.get("operation").map(String::as_str).unwrap_or("");
        match (call.method, call.path.as_str(), op) {
            (Method::Post, SYSTEM_FRAMEWORK_PATH, "systemFrameworkSetting") => {
                self.put_system_setting(&call.form)
            }
            (Method::Post, CREATE_PROJECT_PATH, _) => self.create_project(&call.form),
            (Method::Post, DELETE_PROJECT_PATH, _) => self.delete_project(&call.form),
            (Method::Post, SERVICE_INTEGRATION_PATH, "ServiceNow") => {
                self.put_integration(&call.form)
            }
            (Method::Post, SERVICE_INTEGRATION_PATH, "delete") => {
                self.delete_integration(&call.form)
            }
            _ => not_found(),
        }
    }

    // --- systems -----------------------------------------------------------

    fn get_systems(&self) -> RemoteResponse {
        let st = self.state();
        let own: Vec<Value> = st
            .systems
            .iter()
            .map(|s| {
                let mut raw = json!({
                    "systemKey": { "systemName": s.id },
                    "systemName": s.name,
                    "systemDisplayName": s.display_name,
                });
                if !s.setting.is_empty() {
                    raw["systemSetting"] = Value::String(Value::Object(s.setting.clone()).to_string());
                }
                Value::String(raw.to_string())
            })
            .collect();
        ok_json(json!({ "ownSystemArr": own, "shareSystemArr": [] }))
    }

    fn put_system_setting(&self, form: &BTreeMap<String, String>) -> RemoteResponse {
        let key: Value = parse_field(form, "systemKey");
        let setting: Value = parse_field(form, "systemFrameworkSetting");
        let id = key.get("systemName").and_then(Value::as_str).unwrap_or("");

        let mut st = self.state();
        let Some(system) = st.systems.iter_mut().find(|s| s.id == id) else {
            return ok_json(json!({ "success": false, "message": format!("unknown system {id}") }));
        };
        if let Value::Object(m) = setting {
            system.setting.extend(m);
        }
        ok_json(json!({ "success": true }))
    }

    // --- projects ----------------------------------------------------------

    fn get_project(&self, call: &RecordedCall) -> RemoteResponse {
        let list: Value = call
            .query
            .get("projectList")
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(Value::Null);
        let name = list
            .get(0)
            .and_then(|e| e.get("projectName"))
            .and_then(Value::as_str)
            .unwrap_or("");

        let st = self.state();
        let mut settings = Map::new();
        if let Some(p) = st.projects.get(name) {
            let wrapped = json!({ "DATA": p }).to_string();
            settings.insert(name.to_string(), Value::String(wrapped));
        }
        ok_json(json!({ "settingList": settings }))
    }

    fn create_project(&self, form: &BTreeMap<String, String>) -> RemoteResponse {
        let name = form.get("projectName").cloned().unwrap_or_default();
        let system = form.get("systemName").cloned().unwrap_or_default();

        let mut st = self.state();
        if st.projects.contains_key(&name) {
            return RemoteResponse::new(400, format!("project {name} already existed"));
        }
        if !st.systems.iter().any(|s| s.id == system) {
            return ok_json(json!({ "success": false, "message": format!("unknown system {system}") }));
        }
        let display = form
            .get("projectDisplayName")
            .cloned()
            .unwrap_or_else(|| name.clone());
        let settings = json!({
            "projectName": name,
            "projectDisplayName": display,
            "cValue": 1,
            "pValue": 0.99,
        });
        if let Value::Object(m) = settings {
            st.projects.insert(name, m);
        }
        ok_json(json!({ "success": true }))
    }

    fn put_project(&self, project: &str, body: Option<&Value>) -> RemoteResponse {
        let mut st = self.state();
        let Some(settings) = st.projects.get_mut(project) else {
            return not_found();
        };
        if let Some(Value::Object(m)) = body {
            settings.extend(m.clone());
        }
        ok_json(json!({ "success": true }))
    }

    fn delete_project(&self, form: &BTreeMap<String, String>) -> RemoteResponse {
        let name = form.get("projectName").cloned().unwrap_or_default();
        let mut st = self.state();
        st.keywords.remove(&name);
        match st.projects.remove(&name) {
            Some(_) => ok_json(json!({ "success": true })),
            None => not_found(),
        }
    }

    // --- labels ------------------------------------------------------------

    fn get_keywords(&self, call: &RecordedCall) -> RemoteResponse {
        let project = call.query.get("projectName").cloned().unwrap_or_default();
        let st = self.state();
        if !st.projects.contains_key(&project) {
            return not_found();
        }
        let keywords = st.keywords.get(&project).cloned().unwrap_or_default();
        ok_json(json!({ "keywords": keywords }))
    }

    fn put_label(&self, project: &str, create: &Value) -> RemoteResponse {
        let in_flight = self.label_writers.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_label_writers.fetch_max(in_flight, Ordering::SeqCst);
        if !self.label_write_delay.is_zero() {
            thread::sleep(self.label_write_delay);
        }

        let resp = {
            let label_type = create.get("labelType").and_then(Value::as_str).unwrap_or("");
            let rules: Vec<String> = create
                .get("logLabelString")
                .and_then(Value::as_str)
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default();

            let mut st = self.state();
            if !st.projects.contains_key(project) {
                not_found()
            } else {
                let entry = st.keywords.entry(project.to_string()).or_default();
                let field = api_field_for(label_type).to_string();
                if rules.is_empty() {
                    entry.remove(&field);
                } else {
                    entry.insert(field, rules);
                }
                ok_json(json!({ "success": true }))
            }
        };

        self.label_writers.fetch_sub(1, Ordering::SeqCst);
        resp
    }

    // --- ServiceNow --------------------------------------------------------

    fn get_integration(&self, call: &RecordedCall) -> RemoteResponse {
        let account = call.query.get("account").cloned().unwrap_or_default();
        let host = call.query.get("service_host").cloned().unwrap_or_default();

        let st = self.state();
        let Some(i) = st.integrations.get(&(account.clone(), host.clone())) else {
            return ok_json(json!({}));
        };
        let names: Vec<String> = i
            .system_ids
            .iter()
            .map(|id| {
                st.systems
                    .iter()
                    .find(|s| &s.id == id)
                    .map(|s| s.display_name.clone())
                    .unwrap_or_default()
            })
            .collect();
        let config = json!({
            "systemIds": i.system_ids,
            "systemNames": names,
            "contentOption": i.content_option,
        });
        let app_key = if i.app_key.is_empty() { "" } else { MASK };
        let dampening = i.dampening_period as f64;
        ok_json(json!({
            "key": format!("ServiceNow:{account}:{host}"),
            "password": MASK,
            "dampeningPeriod": dampening,
            "appId": i.app_id,
            "appKey": app_key,
            "authType": i.auth_type.to_uppercase(),
            "serviceNowIntegrationConfig": config.to_string(),
            "options": json!(i.options).to_string(),
        }))
    }

    fn put_integration(&self, form: &BTreeMap<String, String>) -> RemoteResponse {
        if form.get("verify").map(String::as_str) == Some("true") {
            return ok_json(json!({ "success": true }));
        }
        let text = |k: &str| form.get(k).cloned().unwrap_or_default();
        let list = |k: &str| -> Vec<String> { parse_field::<Vec<String>>(form, k) };

        let integration = FakeIntegration {
            password: text("password"),
            dampening_period: text("dampeningPeriod").parse().unwrap_or(0),
            app_id: text("appId"),
            app_key: text("appKey"),
            auth_type: text("auth_type"),
            system_ids: list("systemIds"),
            options: list("options"),
            content_option: list("contentOption"),
        };
        self.state()
            .integrations
            .insert((text("account"), text("service_host")), integration);
        ok_json(json!({ "success": true }))
    }

    fn delete_integration(&self, form: &BTreeMap<String, String>) -> RemoteResponse {
        let service_id = form.get("service_id").cloned().unwrap_or_default();
        let mut parts = service_id.splitn(3, ':');
        let (Some("ServiceNow"), Some(account), Some(host)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return RemoteResponse::new(400, "bad service_id");
        };
        match self
            .state()
            .integrations
            .remove(&(account.to_string(), host.to_string()))
        {
            Some(_) => ok_json(json!({ "success": true })),
            None => not_found(),
        }
    }
}

impl Transport for FakePlatform {
    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse, ClientError> {
        let (route, query) = split_path(path)?;
        let call = RecordedCall {
            method,
            path: route,
            query,
            body: body.cloned(),
            form: BTreeMap::new(),
        };
        if let Some(injected) = self.intercept(call.clone()) {
            return Ok(injected);
        }
        Ok(self.route_json(&call))
    }

    fn call_form(
        &self,
        method: Method,
        path: &str,
        fields: &[(String, String)],
    ) -> Result<RemoteResponse, ClientError> {
        let (route, query) = split_path(path)?;
        let call = RecordedCall {
            method,
            path: route,
            query,
            body: None,
            form: fields.iter().cloned().collect(),
        };
        if let Some(injected) = self.intercept(call.clone()) {
            return Ok(injected);
        }
        Ok(self.route_form(&call))
    }
}

fn split_path(path: &str) -> Result<(String, BTreeMap<String, String>), ClientError> {
    let url = Url::parse(&format!("http://fake.invalid{path}"))
        .map_err(|e| ClientError::InvalidInput(format!("bad path {path}: {e}")))?;
    let query = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    Ok((url.path().to_string(), query))
}

fn parse_field<T: serde::de::DeserializeOwned + Default>(
    form: &BTreeMap<String, String>,
    key: &str,
) -> T {
    form.get(key)
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

fn ok_json(v: Value) -> RemoteResponse {
    RemoteResponse::new(200, v.to_string())
}

fn not_found() -> RemoteResponse {
    RemoteResponse::new(404, "not found")
}
