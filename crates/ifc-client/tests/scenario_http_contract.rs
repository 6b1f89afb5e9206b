use httpmock::prelude::*;
use ifc_client::*;
use serde_json::{json, Map, Value};

fn api(server: &MockServer) -> PlatformApi<HttpTransport> {
    let transport =
        HttpTransport::new(Credentials::new(server.base_url(), "ops", "lic-123")).unwrap();
    PlatformApi::new(transport, "ops")
}

fn obj(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => panic!("not an object"),
    }
}

#[test]
fn scenario_json_calls_carry_identity_headers() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(GET)
            .path("/api/external/v1/systemframework")
            .query_param("customerName", "ops")
            .query_param("needDetail", "true")
            .query_param("tzOffset", "0")
            .header("X-User-Name", "ops")
            .header("X-API-Key", "lic-123");
        then.status(200).json_body(json!({
            "ownSystemArr": ["{\"systemId\":\"s1\",\"systemDisplayName\":\"Billing\"}"],
            "shareSystemArr": []
        }));
    });

    let fw = api(&server).get_system_framework().unwrap().unwrap();
    m.assert();
    assert_eq!(fw.own.len(), 1);
    assert!(fw.shared.is_empty());
}

#[test]
fn scenario_form_calls_append_credentials_fields() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/check-and-add-custom-project")
            .header("X-User-Name", "ops")
            .x_www_form_urlencoded_tuple("operation", "create")
            .x_www_form_urlencoded_tuple("projectName", "proj1")
            .x_www_form_urlencoded_tuple("systemName", "sys-hash")
            .x_www_form_urlencoded_tuple("userName", "ops")
            .x_www_form_urlencoded_tuple("licenseKey", "lic-123");
        then.status(200).json_body(json!({"success": true}));
    });

    api(&server)
        .create_project(&NewProject {
            name: "proj1".into(),
            system_id: "sys-hash".into(),
            data_type: "Log".into(),
            instance_type: "PrivateCloud".into(),
            cloud_type: "PrivateCloud".into(),
            ..Default::default()
        })
        .unwrap();
    m.assert();
}

#[test]
fn scenario_existing_project_counts_as_created() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/check-and-add-custom-project");
        then.status(400).body("project proj1 already existed");
    });

    let p = NewProject {
        name: "proj1".into(),
        ..Default::default()
    };
    api(&server).create_project(&p).unwrap();
}

#[test]
fn scenario_absent_statuses_read_as_none() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/external/v1/watch-tower-setting");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/external/v1/projectkeywords");
        then.status(204);
    });

    let a = api(&server);
    assert!(a.get_project_settings("proj1").unwrap().is_none());
    assert!(a.get_log_labels("proj1").unwrap().is_none());
}

#[test]
fn scenario_project_settings_unwrap_data_member() {
    let server = MockServer::start();
    let inner = json!({"DATA": {"cValue": 3.0, "projectName": "proj1"}}).to_string();
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/external/v1/watch-tower-setting")
            .query_param(
                "projectList",
                r#"[{"customerName":"ops","projectName":"proj1"}]"#,
            );
        then.status(200)
            .json_body(json!({ "settingList": { "proj1": inner } }));
    });

    let settings = api(&server).get_project_settings("proj1").unwrap().unwrap();
    assert_eq!(settings["cValue"], json!(3.0));
}

#[test]
fn scenario_remote_error_keeps_status_and_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/external/v1/watch-tower-setting");
        then.status(500).body("internal: settings store unavailable");
    });

    let err = api(&server)
        .update_project_settings("proj1", &obj(json!({"projectName": "proj1"})))
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err
        .to_string()
        .contains("HTTP 500 - internal: settings store unavailable"));
}

#[test]
fn scenario_label_write_sends_raw_label_type() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(POST)
            .path("/api/external/v1/watch-tower-setting")
            .query_param("projectName", "proj1")
            .query_param("customerName", "ops")
            .json_body(json!({
                "logLabelSettingCreate": {"labelType": "blacklist", "logLabelString": "[\"x\"]"}
            }));
        then.status(200).body("");
    });

    api(&server)
        .put_log_label("proj1", "blacklist", "[\"x\"]")
        .unwrap();
    m.assert();
}

#[test]
fn scenario_label_write_accepts_no_content() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(POST)
            .path("/api/external/v1/watch-tower-setting")
            .query_param("projectName", "proj1");
        then.status(204);
    });

    api(&server)
        .put_log_label("proj1", "whitelist", "[\"ERROR\"]")
        .unwrap();
    m.assert();
}

#[test]
fn scenario_label_keywords_are_reencoded() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/external/v1/projectkeywords")
            .query_param("projectName", "proj1");
        then.status(200).json_body(json!({
            "keywords": {"whitelist": ["ERROR", "FATAL"], "trainingBlacklistLabels": []}
        }));
    });

    let labels = api(&server).get_log_labels("proj1").unwrap().unwrap();
    assert_eq!(labels["whitelist"], r#"["ERROR","FATAL"]"#);
    assert_eq!(labels["trainingBlacklistLabels"], "[]");
}

#[test]
fn scenario_servicenow_delete_tolerates_missing_and_needs_host() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(POST)
            .path("/api/external/v1/service-integration")
            .x_www_form_urlencoded_tuple("operation", "delete")
            .x_www_form_urlencoded_tuple("service_id", "ServiceNow:svc:acme.service-now.com");
        then.status(404);
    });

    let a = api(&server);
    a.delete_servicenow("svc", "acme.service-now.com").unwrap();
    m.assert();

    let err = a.delete_servicenow("svc", "  ").unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));
}

#[test]
fn scenario_connection_failure_is_transport_error() {
    // nothing listens on port 9 locally
    let transport = HttpTransport::new(Credentials::new("http://127.0.0.1:9", "ops", "k")).unwrap();
    let err = PlatformApi::new(transport, "ops")
        .get_project_settings("p")
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
