//! The per-namespace selection of tags marked for removal.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Tags explicitly checked by the user, grouped by namespace.
///
/// Cloning is cheap (the per-namespace sets are `Arc`-shared) and yields a
/// true snapshot: a later `toggle` copies the affected set before mutating,
/// so renders and async continuations holding an earlier clone never observe
/// a torn intermediate state.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    by_namespace: HashMap<String, Arc<HashSet<String>>>,
}

impl Selection {
    /// Flips membership of `tag` in the set for `namespace`, creating the set
    /// on first use.
    pub fn toggle(&mut self, namespace: &str, tag: &str) {
        let entry = self.by_namespace.entry(namespace.to_string()).or_default();
        let set = Arc::make_mut(entry);
        if !set.remove(tag) {
            set.insert(tag.to_string());
        }
    }

    pub fn contains(&self, namespace: &str, tag: &str) -> bool {
        self.by_namespace
            .get(namespace)
            .is_some_and(|set| set.contains(tag))
    }

    /// Total number of selected tags across all namespaces.
    pub fn len(&self) -> usize {
        self.by_namespace.values().map(|set| set.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.by_namespace = HashMap::new();
    }

    /// Converts to the ordered-namespace wire payload. List order within a
    /// namespace carries no meaning.
    pub fn to_payload(&self) -> BTreeMap<String, Vec<String>> {
        self.by_namespace
            .iter()
            .map(|(ns, set)| (ns.clone(), set.iter().cloned().collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn toggle_adds_then_removes() {
        let mut selection = Selection::default();
        selection.toggle("general", "water");
        assert!(selection.contains("general", "water"));
        assert_eq!(selection.len(), 1);

        selection.toggle("general", "water");
        assert!(!selection.contains("general", "water"));
        assert!(selection.is_empty());
    }

    #[test]
    fn namespaces_are_independent() {
        let mut selection = Selection::default();
        selection.toggle("general", "water");
        selection.toggle("artist", "water");
        selection.toggle("general", "water");
        assert!(!selection.contains("general", "water"));
        assert!(selection.contains("artist", "water"));
    }

    #[test]
    fn snapshots_are_isolated_from_later_toggles() {
        let mut selection = Selection::default();
        selection.toggle("general", "water");

        let snapshot = selection.clone();
        selection.toggle("general", "fire");
        selection.toggle("general", "water");

        assert!(snapshot.contains("general", "water"));
        assert!(!snapshot.contains("general", "fire"));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn payload_orders_namespaces() {
        let mut selection = Selection::default();
        selection.toggle("meta", "2018");
        selection.toggle("artist", "alice");
        let payload = selection.to_payload();
        let namespaces: Vec<_> = payload.keys().cloned().collect();
        assert_eq!(namespaces, vec!["artist", "meta"]);
    }

    proptest! {
        #[test]
        fn double_toggle_is_identity(
            ns in "[a-z]{1,6}",
            tag in "[a-z]{1,8}",
            seed in proptest::collection::vec(("[a-z]{1,6}", "[a-z]{1,8}"), 0..8)
        ) {
            let mut selection = Selection::default();
            for (s_ns, s_tag) in &seed {
                selection.toggle(s_ns, s_tag);
            }
            let before = selection.to_payload();
            selection.toggle(&ns, &tag);
            selection.toggle(&ns, &tag);
            let mut after = selection.to_payload();
            // toggle may leave an empty namespace entry behind; membership
            // is what must round-trip.
            after.retain(|_, tags| !tags.is_empty());
            let mut before_nonempty = before;
            before_nonempty.retain(|_, tags| !tags.is_empty());
            let sort = |mut m: std::collections::BTreeMap<String, Vec<String>>| {
                m.values_mut().for_each(|v| v.sort());
                m
            };
            prop_assert_eq!(sort(before_nonempty), sort(after));
        }
    }
}
