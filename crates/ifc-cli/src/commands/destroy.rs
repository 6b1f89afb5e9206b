//! `ifc destroy`: delete every recorded resource, log labels first.

use anyhow::{bail, Result};
use ifc_client::Transport;
use ifc_facade::Platform;
use std::path::Path;

use super::phase;
use crate::state::StateFile;

pub fn run_destroy<T: Transport>(platform: &Platform<T>, state_path: &Path) -> Result<()> {
    let mut state = StateFile::load(state_path)?;

    let mut order = state.resources.clone();
    order.sort_by_key(|e| std::cmp::Reverse(phase(e.kind)));

    let (mut deleted, mut failed) = (0usize, 0usize);
    for entry in order {
        let recorded = entry.to_recorded()?;
        match platform.destroy(&recorded) {
            Ok(()) => {
                state.remove(entry.kind, &entry.key);
                deleted += 1;
                println!("destroyed kind={} key={}", entry.kind, entry.key);
            }
            Err(e) => {
                failed += 1;
                eprintln!(
                    "ERROR: DESTROY_FAILED kind={} key={} error_kind={} {}",
                    entry.kind,
                    entry.key,
                    e.kind(),
                    e
                );
            }
        }
    }

    state.save(state_path)?;
    println!("destroy_ok={} destroyed={} failed={}", failed == 0, deleted, failed);
    if failed > 0 {
        bail!("DESTROY_FAILED: {} resource(s) remain recorded in {}", failed, state_path.display());
    }
    Ok(())
}
