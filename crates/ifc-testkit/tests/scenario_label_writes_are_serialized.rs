//! Scenario: Label Writes Are Serialized
//!
//! # Invariant under test
//! Concurrent label mutations for different resources never overlap: each
//! resource's per-type writes arrive as one uninterrupted block.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ifc_client::PlatformApi;
use ifc_facade::{LabelSetting, LogLabelsDecl, ManagedResource, Platform};
use ifc_reconcile::LabelMutationGate;
use ifc_testkit::FakePlatform;

static GATE: LabelMutationGate = LabelMutationGate::new();

#[test]
fn concurrent_resources_write_in_blocks() {
    let fake = Arc::new(FakePlatform::new().with_label_write_delay(Duration::from_millis(3)));
    let projects = ["p1", "p2", "p3", "p4"];
    for p in projects {
        fake.add_project(p);
    }
    let platform = Arc::new(Platform::new(PlatformApi::new(fake.clone(), "ops")).with_gate(&GATE));

    let handles: Vec<_> = projects
        .iter()
        .map(|p| {
            let platform = platform.clone();
            let decl = LogLabelsDecl {
                project_name: p.to_string(),
                labels: vec![
                    LabelSetting::new("whitelist", r#"["ERROR"]"#),
                    LabelSetting::new("blacklist", r#"["DEBUG"]"#),
                    LabelSetting::new("trainingWhitelist", r#"["WARN"]"#),
                ],
            };
            thread::spawn(move || platform.log_labels().create(&decl).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(fake.peak_label_writers(), 1);

    let writes = fake.label_writes();
    assert_eq!(writes.len(), 12);
    let switches = writes.windows(2).filter(|w| w[0].0 != w[1].0).count();
    assert_eq!(switches, projects.len() - 1);
}

#[test]
fn failed_sequence_releases_the_gate() {
    static LOCAL: LabelMutationGate = LabelMutationGate::new();
    let fake = Arc::new(FakePlatform::new());
    fake.add_project("p1");
    let platform = Platform::new(PlatformApi::new(fake.clone(), "ops")).with_gate(&LOCAL);

    let missing = LogLabelsDecl {
        project_name: "ghost".into(),
        labels: vec![LabelSetting::new("whitelist", r#"["x"]"#)],
    };
    assert!(platform.log_labels().create(&missing).is_err());

    // would block forever if the failed sequence kept the gate
    let ok = LogLabelsDecl {
        project_name: "p1".into(),
        labels: vec![LabelSetting::new("whitelist", r#"["x"]"#)],
    };
    platform.log_labels().create(&ok).unwrap();
}
