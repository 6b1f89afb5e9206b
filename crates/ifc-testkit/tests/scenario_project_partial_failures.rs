//! Scenario: Project Partial Failures
//!
//! # Invariant under test
//! Once the writes succeed, a failed read-back records the declared values
//! with a warning. A failed settings write right after the project was
//! created is a warning too; on update it surfaces the HTTP status and body.
//! A missing system fails before anything is created.

use std::sync::Arc;

use ifc_client::{Method, PlatformApi};
use ifc_facade::{ErrorKind, ManagedResource, Platform, ProjectDecl};
use ifc_testkit::{FakePlatform, CREATE_PROJECT_PATH, SETTINGS_PATH};
use serde_json::{json, Map, Value};

fn decl(system: &str) -> ProjectDecl {
    let mut settings = Map::new();
    settings.insert("cValue".into(), json!(5));
    ProjectDecl {
        name: "proj1".into(),
        system_name: system.into(),
        data_type: "Log".into(),
        instance_type: "PrivateCloud".into(),
        cloud_type: "PrivateCloud".into(),
        settings,
        ..Default::default()
    }
}

fn setup() -> (Arc<FakePlatform>, Platform<Arc<FakePlatform>>) {
    let fake = Arc::new(FakePlatform::new().with_system("sys-1", "Billing"));
    let platform = Platform::new(PlatformApi::new(fake.clone(), "ops"));
    (fake, platform)
}

#[test]
fn failed_read_back_records_declared_settings() {
    let (fake, platform) = setup();
    fake.fail(Method::Get, SETTINGS_PATH, 500, "settings store unavailable");

    let created = platform.projects().create(&decl("Billing")).unwrap();

    let expected: Map<String, Value> = [
        ("cValue".to_string(), json!(5)),
        ("projectName".to_string(), json!("proj1")),
    ]
    .into_iter()
    .collect();
    assert_eq!(created.settings, expected);
    // the project itself was created and configured
    assert_eq!(fake.project("proj1").unwrap()["cValue"], json!(5));
}

#[test]
fn failed_initial_settings_apply_still_records_the_created_project() {
    let (fake, platform) = setup();
    fake.fail(Method::Post, SETTINGS_PATH, 503, "settings store unavailable");

    let created = platform.projects().create(&decl("Billing")).unwrap();

    assert_eq!(created.name, "proj1");
    assert_eq!(created.system_id, "sys-1");
    assert_eq!(created.settings["cValue"], json!(5));
    // the entity exists; the settings write never landed
    assert_eq!(fake.project("proj1").unwrap()["cValue"], json!(1));
}

#[test]
fn failed_update_reports_status_and_body() {
    let (fake, platform) = setup();
    let created = platform.projects().create(&decl("Billing")).unwrap();

    fake.fail(Method::Post, SETTINGS_PATH, 503, "settings store unavailable");
    let mut changed = decl("Billing");
    changed.settings.insert("cValue".into(), json!(7));

    let err = platform.projects().update(&changed, &created).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteError);
    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().contains("settings store unavailable"));
}

#[test]
fn unknown_system_fails_before_create() {
    let (fake, platform) = setup();

    let err = platform.projects().create(&decl("Payroll")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("Payroll"));
    assert!(fake.calls_to(Method::Post, CREATE_PROJECT_PATH).is_empty());
}

#[test]
fn empty_catalog_reports_no_systems() {
    let fake = Arc::new(FakePlatform::new());
    let platform = Platform::new(PlatformApi::new(fake.clone(), "ops"));

    let err = platform.projects().create(&decl("Billing")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "no systems found");
}

#[test]
fn bad_setting_type_fails_before_any_call() {
    let (fake, platform) = setup();
    let mut d = decl("Billing");
    d.settings.insert("cValue".into(), json!(2.5));

    let err = platform.projects().create(&d).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    assert!(err.to_string().contains("cValue"));
    assert!(fake.calls_to(Method::Post, CREATE_PROJECT_PATH).is_empty());
}

#[test]
fn existing_project_is_adopted_on_create() {
    let (fake, platform) = setup();
    fake.add_project("proj1");

    let created = platform.projects().create(&decl("Billing")).unwrap();
    assert_eq!(created.settings["cValue"], json!(5));
}
