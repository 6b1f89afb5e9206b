//! `ifc apply`: converge the platform on the declared resources.
//!
//! Declared resources are created, or updated when they differ from what is
//! recorded; recorded resources that are no longer declared are deleted. The state file is written even when some
//! operations fail, so completed work is never forgotten.

use anyhow::{bail, Result};
use ifc_client::Transport;
use ifc_facade::{DeclaredResource, Platform, RecordedResource};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{phase, run_bounded};
use crate::state::{StateEntry, StateFile};

pub async fn run_apply<T: Transport + 'static>(
    platform: Arc<Platform<T>>,
    declared: Vec<DeclaredResource>,
    state_path: &Path,
    parallelism: usize,
) -> Result<()> {
    let mut state = StateFile::load(state_path)?;
    let wanted: BTreeSet<_> = declared.iter().map(|d| (d.kind(), d.key())).collect();

    let mut applied = 0usize;
    let mut unchanged = 0usize;
    let mut deleted = 0usize;
    let mut failed = 0usize;

    // ---------------------------------------------------------------------
    // create / update
    // ---------------------------------------------------------------------
    for p in [0u8, 1] {
        let mut jobs: Vec<(DeclaredResource, Option<RecordedResource>)> = Vec::new();
        for d in declared.iter().filter(|d| phase(d.kind()) == p) {
            let previous = state
                .get(d.kind(), &d.key())
                .map(StateEntry::to_recorded)
                .transpose()?;
            if previous.as_ref().is_some_and(|r| d.in_sync(r)) {
                unchanged += 1;
                println!("unchanged kind={} key={}", d.kind(), d.key());
                continue;
            }
            jobs.push((d.clone(), previous));
        }
        info!(phase = p, resources = jobs.len(), "applying declared resources");

        let results = run_bounded(
            &platform,
            jobs,
            parallelism,
            |platform, job: &(DeclaredResource, Option<RecordedResource>)| {
                platform.apply(&job.0, job.1.as_ref())
            },
        )
        .await?;

        for ((d, prev), out) in results {
            let action = if prev.is_some() { "update" } else { "create" };
            match out {
                Ok(rec) => {
                    state.upsert(StateEntry::from_recorded(&rec)?);
                    applied += 1;
                    println!("applied kind={} key={} action={}", d.kind(), d.key(), action);
                }
                Err(e) => {
                    failed += 1;
                    eprintln!(
                        "ERROR: APPLY_FAILED kind={} key={} action={} error_kind={} {}",
                        d.kind(),
                        d.key(),
                        action,
                        e.kind(),
                        e
                    );
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // delete what is no longer declared
    // ---------------------------------------------------------------------
    for p in [1u8, 0] {
        let mut jobs: Vec<RecordedResource> = Vec::new();
        for e in state
            .resources
            .iter()
            .filter(|e| phase(e.kind) == p && !wanted.contains(&(e.kind, e.key.clone())))
        {
            jobs.push(e.to_recorded()?);
        }
        if jobs.is_empty() {
            continue;
        }
        info!(phase = p, resources = jobs.len(), "deleting undeclared resources");

        let results = run_bounded(&platform, jobs, parallelism, |platform, r: &RecordedResource| {
            platform.destroy(r)
        })
        .await?;

        for (r, out) in results {
            match out {
                Ok(()) => {
                    state.remove(r.kind(), &r.key());
                    deleted += 1;
                    println!("deleted kind={} key={}", r.kind(), r.key());
                }
                Err(e) => {
                    failed += 1;
                    eprintln!(
                        "ERROR: DELETE_FAILED kind={} key={} error_kind={} {}",
                        r.kind(),
                        r.key(),
                        e.kind(),
                        e
                    );
                }
            }
        }
    }

    state.save(state_path)?;
    println!(
        "apply_ok={} applied={} unchanged={} deleted={} failed={} state={}",
        failed == 0,
        applied,
        unchanged,
        deleted,
        failed,
        state_path.display()
    );

    if failed > 0 {
        bail!(
            "APPLY_FAILED: {} resource operation(s) failed; completed work saved to {}",
            failed,
            state_path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::destroy::run_destroy;
    use crate::commands::refresh::run_refresh;
    use ifc_client::PlatformApi;
    use ifc_client::Method;
    use ifc_facade::{
        JwtDecl, LabelSetting, LogLabelsDecl, ProjectDecl, ResourceKind, ServiceNowDecl,
    };
    use ifc_testkit::FakePlatform;

    fn project(name: &str) -> DeclaredResource {
        DeclaredResource::Project(ProjectDecl {
            name: name.to_string(),
            system_name: "Billing".into(),
            data_type: "Log".into(),
            instance_type: "PrivateCloud".into(),
            cloud_type: "PrivateCloud".into(),
            ..Default::default()
        })
    }

    fn labels(project: &str) -> DeclaredResource {
        DeclaredResource::LogLabels(LogLabelsDecl {
            project_name: project.to_string(),
            labels: vec![LabelSetting::new("whitelist", r#"["ERROR"]"#)],
        })
    }

    #[tokio::test]
    async fn apply_records_declared_then_prunes_undeclared() {
        let fake = Arc::new(FakePlatform::new().with_system("sys-1", "Billing"));
        let platform = Arc::new(Platform::new(PlatformApi::new(fake.clone(), "ops")));
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");

        run_apply(
            Arc::clone(&platform),
            vec![labels("proj1"), project("proj1")],
            &state_path,
            2,
        )
        .await
        .unwrap();

        let state = StateFile::load(&state_path).unwrap();
        assert!(state.get(ResourceKind::Project, "proj1").is_some());
        assert!(state.get(ResourceKind::LogLabels, "proj1").is_some());
        assert!(fake.project("proj1").is_some());
        assert!(!fake.keywords("proj1").is_empty());

        let jwt = DeclaredResource::Jwt(JwtDecl::new("Billing", "s3cret-value"));
        run_apply(Arc::clone(&platform), vec![jwt], &state_path, 2)
            .await
            .unwrap();

        let state = StateFile::load(&state_path).unwrap();
        let kinds: Vec<ResourceKind> = state.resources.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ResourceKind::Jwt]);
        assert!(fake.project("proj1").is_none());
    }

    #[tokio::test]
    async fn second_apply_of_the_same_declarations_writes_nothing() {
        let fake = Arc::new(FakePlatform::new().with_system("sys-1", "Billing"));
        let platform = Arc::new(Platform::new(PlatformApi::new(fake.clone(), "ops")));
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");

        let mut with_settings = project("proj1");
        if let DeclaredResource::Project(p) = &mut with_settings {
            p.settings.insert("cValue".into(), serde_json::json!(5));
            p.labels = Some(vec![LabelSetting::new("whitelist", r#"[ "ERROR" ]"#)]);
        }
        let declared = vec![
            with_settings,
            labels("proj2"),
            project("proj2"),
            DeclaredResource::Jwt(JwtDecl::new("Billing", "s3cret-value")),
            DeclaredResource::ServiceNow(ServiceNowDecl {
                service_host: "acme.service-now.com".into(),
                account: "svc".into(),
                password: "pw".into(),
                system_names: vec!["Billing".into()],
                options: vec!["incident".into()],
                ..Default::default()
            }),
        ];

        run_apply(Arc::clone(&platform), declared.clone(), &state_path, 2)
            .await
            .unwrap();
        let first = StateFile::load(&state_path).unwrap();
        let writes_after_first = fake.calls().iter().filter(|c| c.method == Method::Post).count();

        run_apply(Arc::clone(&platform), declared, &state_path, 2)
            .await
            .unwrap();
        let writes_after_second = fake.calls().iter().filter(|c| c.method == Method::Post).count();

        assert_eq!(writes_after_second, writes_after_first);
        assert_eq!(StateFile::load(&state_path).unwrap().resources, first.resources);
    }

    #[tokio::test]
    async fn failed_operations_still_save_completed_work() {
        let fake = Arc::new(FakePlatform::new().with_system("sys-1", "Billing"));
        let platform = Arc::new(Platform::new(PlatformApi::new(fake.clone(), "ops")));
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");

        // labels for a project that does not exist fail; the jwt succeeds
        let jwt = DeclaredResource::Jwt(JwtDecl::new("Billing", "s3cret-value"));
        let err = run_apply(
            Arc::clone(&platform),
            vec![jwt, labels("ghost")],
            &state_path,
            4,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("APPLY_FAILED"));

        let state = StateFile::load(&state_path).unwrap();
        assert!(state.get(ResourceKind::Jwt, "Billing").is_some());
        assert!(state.get(ResourceKind::LogLabels, "ghost").is_none());
    }

    #[tokio::test]
    async fn refresh_drops_gone_resources_and_destroy_empties_state() {
        let fake = Arc::new(FakePlatform::new().with_system("sys-1", "Billing"));
        let platform = Arc::new(Platform::new(PlatformApi::new(fake.clone(), "ops")));
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");

        run_apply(
            Arc::clone(&platform),
            vec![project("proj1"), project("proj2")],
            &state_path,
            4,
        )
        .await
        .unwrap();

        fake.remove_project("proj2");
        run_refresh(Arc::clone(&platform), &state_path, 4).await.unwrap();
        let state = StateFile::load(&state_path).unwrap();
        assert!(state.get(ResourceKind::Project, "proj1").is_some());
        assert!(state.get(ResourceKind::Project, "proj2").is_none());

        let p = Arc::clone(&platform);
        let path = state_path.clone();
        tokio::task::spawn_blocking(move || run_destroy(&p, &path))
            .await
            .unwrap()
            .unwrap();
        assert!(StateFile::load(&state_path).unwrap().resources.is_empty());
        assert!(fake.project("proj1").is_none());
    }
}
