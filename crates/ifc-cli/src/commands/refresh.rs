//! `ifc refresh`: re-read every recorded resource; drop the ones that are gone.

use anyhow::{bail, Result};
use ifc_client::Transport;
use ifc_facade::{Platform, RecordedResource};
use std::path::Path;
use std::sync::Arc;

use super::run_bounded;
use crate::state::{StateEntry, StateFile};

pub async fn run_refresh<T: Transport + 'static>(
    platform: Arc<Platform<T>>,
    state_path: &Path,
    parallelism: usize,
) -> Result<()> {
    let mut state = StateFile::load(state_path)?;
    let jobs = state
        .resources
        .iter()
        .map(StateEntry::to_recorded)
        .collect::<Result<Vec<_>>>()?;

    let results = run_bounded(&platform, jobs, parallelism, |platform, r: &RecordedResource| {
        platform.refresh(r)
    })
    .await?;

    let (mut present, mut gone, mut failed) = (0usize, 0usize, 0usize);
    for (r, out) in results {
        match out {
            Ok(Some(fresh)) => {
                state.upsert(StateEntry::from_recorded(&fresh)?);
                present += 1;
                println!("refreshed kind={} key={} status=present", r.kind(), r.key());
            }
            Ok(None) => {
                state.remove(r.kind(), &r.key());
                gone += 1;
                println!("refreshed kind={} key={} status=gone", r.kind(), r.key());
            }
            Err(e) => {
                failed += 1;
                eprintln!(
                    "ERROR: REFRESH_FAILED kind={} key={} error_kind={} {}",
                    r.kind(),
                    r.key(),
                    e.kind(),
                    e
                );
            }
        }
    }

    state.save(state_path)?;
    println!(
        "refresh_ok={} present={} gone={} failed={}",
        failed == 0,
        present,
        gone,
        failed
    );
    if failed > 0 {
        bail!("REFRESH_FAILED: {} resource(s) could not be read; their records were kept", failed);
    }
    Ok(())
}
