use std::collections::BTreeMap;

use crate::catalog::{CatalogSnapshot, Entity};
use crate::error::ReconcileError;

const WHAT: &str = "system";

/// Reject blank names before any catalog is fetched.
pub fn check_names(names: &[String]) -> Result<(), ReconcileError> {
    if names.iter().any(|n| n.trim().is_empty()) {
        return Err(ReconcileError::invalid_input("system name cannot be empty"));
    }
    Ok(())
}

/// Resolve operator-facing names to backend ids.
///
/// Matching is case-insensitive over both the display name and the system
/// name of each entity. When several entities fold to the same name the
/// first in catalog order wins. Every unmatched name is reported in a single
/// `NotFound`.
pub fn resolve_names_to_ids(
    names: &[String],
    catalog: &CatalogSnapshot,
) -> Result<Vec<String>, ReconcileError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    check_names(names)?;
    if catalog.is_empty() {
        return Err(ReconcileError::NotFound {
            what: WHAT.to_string(),
            missing: Vec::new(),
        });
    }

    let mut by_name: BTreeMap<String, &str> = BTreeMap::new();
    for e in catalog.entities() {
        for candidate in [e.display_name.as_str(), e.name.as_str()] {
            let folded = fold(candidate);
            if !folded.is_empty() {
                by_name.entry(folded).or_insert(e.id.as_str());
            }
        }
    }

    let mut ids = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match by_name.get(&fold(name)) {
            Some(id) => ids.push(id.to_string()),
            None => missing.push(name.trim().to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(ReconcileError::NotFound {
            what: WHAT.to_string(),
            missing,
        });
    }
    Ok(ids)
}

/// Resolve backend ids to display names. Never fails: an id with no entity
/// comes back as itself, trimmed. The output is index-aligned with `ids`.
pub fn resolve_ids_to_names(ids: &[String], catalog: &CatalogSnapshot) -> Vec<String> {
    let mut by_id: BTreeMap<&str, &str> = BTreeMap::new();
    for e in catalog.entities() {
        let display = e.display();
        if !display.is_empty() {
            by_id.entry(e.id.as_str()).or_insert(display);
        }
    }

    ids.iter()
        .map(|id| id.trim())
        .map(|id| by_id.get(id).copied().unwrap_or(id).to_string())
        .collect()
}

/// First entity whose id-like fields match `id`, ignoring case.
pub fn find_entity<'a>(catalog: &'a CatalogSnapshot, id: &str) -> Option<&'a Entity> {
    catalog.entities().iter().find(|e| e.has_id(id))
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}
