use std::collections::BTreeSet;

/// Order `valid_now` against a previously recorded order.
///
/// 1) entries of `previous` still in `valid_now` keep their relative order
/// 2) remaining valid entries are appended in `fallback` order
///
/// Entries that are no longer valid are dropped, as are valid entries that
/// appear in neither list. Duplicates are emitted once.
pub fn align<P, F>(previous: &[P], valid_now: &BTreeSet<String>, fallback: &[F]) -> Vec<String>
where
    P: AsRef<str>,
    F: AsRef<str>,
{
    let mut consumed: BTreeSet<&str> = BTreeSet::new();
    let mut out = Vec::with_capacity(valid_now.len());

    // 1) stability anchor
    for entry in previous.iter().map(AsRef::as_ref) {
        if valid_now.contains(entry) && consumed.insert(entry) {
            out.push(entry.to_string());
        }
    }

    // 2) deterministic placement for new entries
    for entry in fallback.iter().map(AsRef::as_ref) {
        if valid_now.contains(entry) && consumed.insert(entry) {
            out.push(entry.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicate_previous_entries_are_emitted_once() {
        let out = align(&["a", "a", "b"], &set(&["a", "b"]), &["b", "a"]);
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn valid_entries_outside_both_lists_are_dropped() {
        let out = align::<&str, &str>(&[], &set(&["zzz"]), &["a"]);
        assert!(out.is_empty());
    }
}
