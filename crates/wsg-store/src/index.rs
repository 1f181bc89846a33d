//! Reverse pointer index.
//!
//! Forward pointers live in the records themselves; this index holds the
//! inverse view, keyed by target, so "who points at me" is a single lookup.
//! It is derived state: [`PointerIndex::rebuild`] recomputes it from records,
//! and the mutation engine keeps it current incrementally.

use std::collections::{BTreeSet, HashMap};

use wsg_types::Handle;

use crate::record::{Record, ReversePointer};

#[derive(Clone, Debug, Default)]
pub(crate) struct PointerIndex {
    reverse: HashMap<Handle, BTreeSet<ReversePointer>>,
}

impl PointerIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Recompute the index from scratch.
    pub(crate) fn rebuild<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut index = Self::new();
        for record in records {
            for fp in record.forward_pointers() {
                index.insert(
                    fp.target,
                    ReversePointer {
                        source: fp.source,
                        field_index: fp.field_index,
                    },
                );
            }
        }
        index
    }

    /// Record that `entry` points at `target`. Returns `false` if already present.
    pub(crate) fn insert(&mut self, target: Handle, entry: ReversePointer) -> bool {
        self.reverse.entry(target).or_default().insert(entry)
    }

    /// Forget that `entry` points at `target`. Returns `false` if absent.
    pub(crate) fn remove(&mut self, target: Handle, entry: &ReversePointer) -> bool {
        let Some(set) = self.reverse.get_mut(&target) else {
            return false;
        };
        let removed = set.remove(entry);
        if set.is_empty() {
            self.reverse.remove(&target);
        }
        removed
    }

    /// All reverse entries for `target`, sorted by (source, field index).
    pub(crate) fn reverse(&self, target: &Handle) -> Option<&BTreeSet<ReversePointer>> {
        self.reverse.get(target)
    }

    /// Number of reverse entries for `target`.
    pub(crate) fn count(&self, target: &Handle) -> usize {
        self.reverse.get(target).map_or(0, BTreeSet::len)
    }

    /// Total number of reverse entries across all targets.
    pub(crate) fn total(&self) -> usize {
        self.reverse.values().map(BTreeSet::len).sum()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Handle, &BTreeSet<ReversePointer>)> {
        self.reverse.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rp(source: u128, field_index: usize) -> ReversePointer {
        ReversePointer {
            source: Handle::from_u128(source),
            field_index,
        }
    }

    #[test]
    fn insert_and_remove() {
        let mut index = PointerIndex::new();
        let target = Handle::from_u128(9);
        assert!(index.insert(target, rp(1, 2)));
        assert!(!index.insert(target, rp(1, 2)));
        assert_eq!(index.count(&target), 1);
        assert!(index.remove(target, &rp(1, 2)));
        assert!(!index.remove(target, &rp(1, 2)));
        assert!(index.reverse(&target).is_none());
    }

    #[test]
    fn empty_sets_are_dropped() {
        let mut index = PointerIndex::new();
        let target = Handle::from_u128(9);
        index.insert(target, rp(1, 0));
        index.insert(target, rp(2, 0));
        index.remove(target, &rp(1, 0));
        assert_eq!(index.count(&target), 1);
        index.remove(target, &rp(2, 0));
        assert_eq!(index.total(), 0);
        assert_eq!(index.iter().count(), 0);
    }

    #[test]
    fn entries_are_sorted() {
        let mut index = PointerIndex::new();
        let target = Handle::from_u128(9);
        index.insert(target, rp(3, 1));
        index.insert(target, rp(1, 5));
        index.insert(target, rp(1, 2));
        let order: Vec<_> = index.reverse(&target).unwrap().iter().copied().collect();
        assert_eq!(order, vec![rp(1, 2), rp(1, 5), rp(3, 1)]);
    }
}
