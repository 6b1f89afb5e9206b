use std::collections::BTreeSet;

use ifc_reconcile::*;

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn scenario_prior_order_kept_new_entry_appended() {
    let out = align(&["b", "a"], &set(&["a", "b", "c"]), &["a", "b", "c"]);
    assert_eq!(out, vec!["b", "a", "c"]);
}

#[test]
fn scenario_disappeared_entry_dropped() {
    let out = align(&["a", "b"], &set(&["a"]), &["a", "b"]);
    assert_eq!(out, vec!["a"]);
}

#[test]
fn scenario_first_pass_uses_fallback_order() {
    let out = align::<&str, &str>(&[], &set(&["c", "a"]), &["a", "b", "c"]);
    assert_eq!(out, vec!["a", "c"]);
}

#[test]
fn scenario_repeated_alignment_is_stable() {
    let valid = set(&["x", "y", "z"]);
    let first = align(&["z"], &valid, &["x", "y", "z"]);
    let second = align(&first, &valid, &["x", "y", "z"]);
    assert_eq!(first, vec!["z", "x", "y"]);
    assert_eq!(first, second);
}
