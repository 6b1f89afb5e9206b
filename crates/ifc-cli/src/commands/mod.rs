//! Command handler modules for the `ifc` binary.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod apply;
pub mod destroy;
pub mod import;
pub mod refresh;
pub mod systems;

use anyhow::{Context, Result};
use ifc_client::{Credentials, HttpTransport, PlatformApi, Transport};
use ifc_config::LoadedConfig;
use ifc_facade::{Platform, ResourceKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub fn load_config(config_paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    ifc_config::load_layered_yaml(&path_refs)
}

/// Build the platform handle from the config's `/platform` section and the
/// credential env vars.
///
/// The transport is blocking: call this outside the tokio runtime.
pub fn connect(loaded: &LoadedConfig) -> Result<Platform<HttpTransport>> {
    let secrets = ifc_config::secrets::resolve_platform_credentials(&loaded.config_json)?;
    let customer = secrets.username.clone();
    let transport = HttpTransport::with_timeout(
        Credentials::new(secrets.base_url, secrets.username, secrets.license_key),
        Duration::from_secs(loaded.timeout_secs()),
    )
    .context("platform transport setup failed")?;
    Ok(Platform::new(PlatformApi::new(transport, customer)))
}

/// Log labels hang off projects: they are written after every project and
/// removed before any project.
pub fn phase(kind: ResourceKind) -> u8 {
    match kind {
        ResourceKind::LogLabels => 1,
        ResourceKind::Project | ResourceKind::Jwt | ResourceKind::ServiceNow => 0,
    }
}

/// Run `op` over every job on the blocking pool, at most `parallelism` at a
/// time. Results come back in completion order, each paired with its job.
pub async fn run_bounded<T, J, R, F>(
    platform: &Arc<Platform<T>>,
    jobs: Vec<J>,
    parallelism: usize,
    op: F,
) -> Result<Vec<(J, Result<R, ifc_facade::Error>)>>
where
    T: Transport + 'static,
    J: Send + 'static,
    R: Send + 'static,
    F: Fn(&Platform<T>, &J) -> Result<R, ifc_facade::Error> + Clone + Send + 'static,
{
    let limit = parallelism.max(1);
    let mut pending = jobs.into_iter();
    let mut set = JoinSet::new();
    let mut done = Vec::new();

    loop {
        while set.len() < limit {
            let Some(job) = pending.next() else { break };
            let platform = Arc::clone(platform);
            let op = op.clone();
            set.spawn_blocking(move || {
                let out = op(&platform, &job);
                (job, out)
            });
        }
        match set.join_next().await {
            Some(joined) => done.push(joined.context("resource worker panicked")?),
            None => break,
        }
    }
    Ok(done)
}
