//! `ifc import`: adopt an existing platform resource into the state file.

use anyhow::{bail, Result};
use ifc_client::Transport;
use ifc_facade::{Platform, ResourceKind};
use std::path::Path;

use crate::state::{StateEntry, StateFile};

pub fn run_import<T: Transport>(
    platform: &Platform<T>,
    kind: ResourceKind,
    key: &str,
    state_path: &Path,
) -> Result<()> {
    let mut state = StateFile::load(state_path)?;
    if state.get(kind, key).is_some() {
        bail!("IMPORT_CONFLICT: {} '{}' is already recorded in {}", kind, key, state_path.display());
    }

    let Some(recorded) = platform.import(kind, key)? else {
        bail!("IMPORT_NOT_FOUND: {} '{}' does not exist on the platform", kind, key);
    };

    let entry = StateEntry::from_recorded(&recorded)?;
    println!("imported kind={} key={}", entry.kind, entry.key);
    state.upsert(entry);
    state.save(state_path)?;
    Ok(())
}
