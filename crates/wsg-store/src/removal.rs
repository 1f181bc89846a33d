//! Record removal.
//!
//! Removal nullifies every inbound pointer, drops the record's own outbound
//! pointers, then frees the slot. It never deletes referrers that become
//! invalid as a result; those stay in the store and surface in validation.

use serde::{Deserialize, Serialize};
use tracing::debug;
use wsg_types::Handle;

use crate::events::StoreEvent;
use crate::record::ForwardPointer;
use crate::store::RecordStore;

/// Outcome of a removal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removed {
    /// Records actually destroyed, in removal order.
    pub removed: Vec<Handle>,
    /// Inbound pointers that were nullified, as they were before removal.
    pub unlinked: Vec<ForwardPointer>,
}

impl Removed {
    /// Returns `true` if nothing was destroyed.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.removed.len()
    }

    fn absorb(&mut self, other: Removed) {
        self.removed.extend(other.removed);
        self.unlinked.extend(other.unlinked);
    }
}

impl RecordStore {
    /// Remove a record. Removing an absent handle is a no-op that returns an
    /// empty [`Removed`].
    pub fn remove(&mut self, handle: &Handle) -> Removed {
        let removed = self.remove_one(handle);
        self.events.flush();
        removed
    }

    /// Remove several records. Events are delivered once, at the end.
    pub fn remove_many<'a>(&mut self, handles: impl IntoIterator<Item = &'a Handle>) -> Removed {
        let mut total = Removed::default();
        for handle in handles {
            total.absorb(self.remove_one(handle));
        }
        self.events.flush();
        total
    }

    fn remove_one(&mut self, handle: &Handle) -> Removed {
        if !self.records.contains_key(handle) {
            return Removed::default();
        }

        // Inbound pointers, including any self-pointers.
        let inbound = self.reverse_pointers(handle);
        let mut unlinked = Vec::with_capacity(inbound.len());
        for rp in inbound {
            if let Some(target) = self.nullify_pointer(&rp.source, rp.field_index) {
                if rp.source != *handle {
                    unlinked.push(ForwardPointer {
                        source: rp.source,
                        field_index: rp.field_index,
                        target,
                    });
                }
            }
        }

        // Outbound pointers still held by the record itself.
        for fp in self.forward_pointers(handle) {
            self.nullify_pointer(&fp.source, fp.field_index);
        }

        self.records.shift_remove(handle);
        debug!(handle = %handle.short_id(), unlinked = unlinked.len(), "record removed");
        self.events.stage(StoreEvent::Removed(*handle));

        Removed {
            removed: vec![*handle],
            unlinked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assert_consistent, rt, space_type, store, surface, zone};
    use crate::FieldSlot;

    #[test]
    fn remove_nullifies_referrers() {
        let mut store = store();
        let b = zone(&mut store, "B");
        let a = surface(&mut store, "A", b);
        store.drain_events();

        let removed = store.remove(&b);
        assert_eq!(removed.removed, vec![b]);
        assert_eq!(
            removed.unlinked,
            vec![ForwardPointer {
                source: a,
                field_index: 2,
                target: b
            }]
        );
        assert!(!store.contains(&b));
        assert_eq!(store.get_pointer(&a, 2), None);
        assert_eq!(store.get(&a).unwrap().field(2), Some(&FieldSlot::Pointer(Handle::null())));
        assert!(store.reverse_pointers(&b).is_empty());
        assert_consistent(&store);

        assert_eq!(
            store.drain_events(),
            vec![
                StoreEvent::Changed { handle: a, field_index: 2 },
                StoreEvent::Removed(b)
            ]
        );
    }

    #[test]
    fn referrers_left_invalid_are_kept() {
        let mut store = store();
        let b = zone(&mut store, "B");
        let a = surface(&mut store, "A", b);
        let removed = store.remove(&b);
        assert_eq!(removed.len(), 1);
        assert!(store.contains(&a));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = store();
        let b = zone(&mut store, "B");
        surface(&mut store, "A", b);

        store.remove(&b);
        let after_first = store.snapshot();
        store.drain_events();

        let second = store.remove(&b);
        assert!(second.is_empty());
        assert_eq!(store.snapshot(), after_first);
        assert!(store.drain_events().is_empty());
    }

    #[test]
    fn remove_drops_own_outbound_entries() {
        let mut store = store();
        let st = space_type(&mut store, "Office");
        let z = zone(&mut store, "Core");
        store.set_pointer(&z, 1, st).unwrap();

        let removed = store.remove(&z);
        assert!(removed.unlinked.is_empty());
        assert!(store.reverse_pointers(&st).is_empty());
        assert!(store.sources(&st).is_empty());
        assert_consistent(&store);
    }

    #[test]
    fn remove_many_reports_every_record() {
        let mut store = store();
        let a = zone(&mut store, "A");
        let b = zone(&mut store, "B");
        let list = store
            .create(rt("ZoneList"), vec![FieldSlot::scalar("All")])
            .unwrap();
        store.push_pointer(&list, a).unwrap();
        store.push_pointer(&list, b).unwrap();
        store.drain_events();

        let removed = store.remove_many([a, b, Handle::new()].iter());
        assert_eq!(removed.removed, vec![a, b]);
        assert_eq!(removed.unlinked.len(), 2);
        assert_eq!(store.targets(&list), Vec::<Handle>::new());
        assert_eq!(store.field_count(&list), 3);
        assert_consistent(&store);

        let events = store.drain_events();
        assert_eq!(events.len(), 4);
        assert!(events.contains(&StoreEvent::Removed(a)));
        assert!(events.contains(&StoreEvent::Removed(b)));
    }

    #[test]
    fn insertion_order_survives_removal() {
        let mut store = store();
        let a = zone(&mut store, "A");
        let b = zone(&mut store, "B");
        let c = zone(&mut store, "C");
        store.remove(&b);
        assert_eq!(store.handles(), vec![a, c]);
    }
}
