//! Scenario: Absent Resources Read As Gone
//!
//! # Invariant under test
//! A resource deleted outside this tool reads as `None`, never as an error.
//! Lookups of a missing project fail with NOT_FOUND.

use std::sync::Arc;

use ifc_client::PlatformApi;
use ifc_facade::{
    ErrorKind, JwtRecord, LabelSetting, LogLabelsRecord, ManagedResource, Platform,
    ProjectDecl, ServiceNowRecord,
};
use ifc_testkit::FakePlatform;

fn setup() -> (Arc<FakePlatform>, Platform<Arc<FakePlatform>>) {
    let fake = Arc::new(FakePlatform::new().with_system("sys-1", "Billing"));
    let platform = Platform::new(PlatformApi::new(fake.clone(), "ops"));
    (fake, platform)
}

#[test]
fn deleted_project_reads_as_none() {
    let (fake, platform) = setup();
    let created = platform
        .projects()
        .create(&ProjectDecl {
            name: "proj1".into(),
            system_name: "Billing".into(),
            data_type: "Log".into(),
            instance_type: "PrivateCloud".into(),
            cloud_type: "PrivateCloud".into(),
            ..Default::default()
        })
        .unwrap();

    fake.remove_project("proj1");
    assert!(platform.projects().read(&created).unwrap().is_none());
    assert!(platform.projects().import("proj1").unwrap().is_none());
}

#[test]
fn missing_labels_integration_and_system_read_as_none() {
    let (_fake, platform) = setup();

    let labels = LogLabelsRecord {
        project_name: "nope".into(),
        labels: vec![LabelSetting::new("whitelist", r#"["x"]"#)],
    };
    assert!(platform.log_labels().read(&labels).unwrap().is_none());

    let sn = ServiceNowRecord {
        account: "svc".into(),
        service_host: "acme.service-now.com".into(),
        auth_type: "basic".into(),
        ..Default::default()
    };
    assert!(platform.servicenow().read(&sn).unwrap().is_none());

    let jwt = JwtRecord {
        system_name: "Payroll".into(),
        system_id: "sys-9".into(),
        jwt_secret: "secret-1".into(),
        jwt_type: 1,
    };
    assert!(platform.jwt().read(&jwt).unwrap().is_none());
}

#[test]
fn project_lookup() {
    let (fake, platform) = setup();
    fake.add_project("proj1");
    fake.set_project_setting("proj1", "cValue", serde_json::json!(3.0));
    fake.set_project_setting("proj1", "pValue", serde_json::json!(0.95));
    fake.set_project_setting("proj1", "projectDisplayName", serde_json::json!("Project One"));

    let p = platform.lookup_project("proj1").unwrap();
    assert_eq!(p.c_value, Some(3));
    assert_eq!(p.p_value, Some(0.95));
    assert_eq!(p.display_name.as_deref(), Some("Project One"));

    let err = platform.lookup_project("ghost").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "project 'ghost' not found");
}

#[test]
fn systems_are_listed_in_catalog_order() {
    let (fake, platform) = setup();
    fake.add_system("sys-2", "auth-svc", "");

    let systems = platform.list_systems().unwrap();
    let view: Vec<(&str, &str)> = systems
        .iter()
        .map(|s| (s.id.as_str(), s.display_name.as_str()))
        .collect();
    assert_eq!(view, vec![("sys-1", "Billing"), ("sys-2", "auth-svc")]);
}

#[test]
fn empty_catalog_lists_nothing() {
    let fake = Arc::new(FakePlatform::new());
    let platform = Platform::new(PlatformApi::new(fake, "ops"));
    assert!(platform.list_systems().unwrap().is_empty());
}
