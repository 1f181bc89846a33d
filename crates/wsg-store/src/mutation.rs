//! The mutation engine.
//!
//! Every write to a record goes through here. Each public mutator follows the
//! same shape: validate everything against the schema and the current graph,
//! then apply the field change together with its reverse-index update, then
//! stage events and flush. A rejected call leaves the store untouched.

use tracing::debug;
use wsg_schema::{FieldKind, RecordLayout};
use wsg_types::{Handle, RecordType};

use crate::error::{StoreError, StoreResult};
use crate::events::StoreEvent;
use crate::record::{FieldSlot, Record, ReversePointer};
use crate::store::RecordStore;

impl RecordStore {
    // ---------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------

    /// Create a record under a freshly minted handle.
    ///
    /// `initial_fields` fill indices `0..n`; the record is then padded with
    /// empty slots up to the type's minimum field count.
    pub fn create(&mut self, record_type: RecordType, initial_fields: Vec<FieldSlot>) -> StoreResult<Handle> {
        self.create_with_handle(Handle::new(), record_type, initial_fields)
    }

    /// Create a record under a caller-chosen handle.
    pub fn create_with_handle(
        &mut self,
        handle: Handle,
        record_type: RecordType,
        initial_fields: Vec<FieldSlot>,
    ) -> StoreResult<Handle> {
        if handle.is_null() {
            return Err(StoreError::NullHandle);
        }
        if self.records.contains_key(&handle) {
            return Err(StoreError::DuplicateHandle(handle));
        }
        let layout = self.layout_of(&record_type)?;
        for (index, slot) in initial_fields.iter().enumerate() {
            self.check_slot(handle, &record_type, index, slot, initial_fields.len())?;
        }

        let fields = self.pad_to_min(&record_type, &layout, initial_fields);
        let record = Record::new(handle, record_type, fields);
        for fp in record.forward_pointers() {
            self.index.insert(
                fp.target,
                ReversePointer {
                    source: handle,
                    field_index: fp.field_index,
                },
            );
        }
        debug!(handle = %handle.short_id(), record_type = %record.record_type(), fields = record.field_count(), "record created");
        self.records.insert(handle, record);

        self.events.stage(StoreEvent::Added(handle));
        self.events.flush();
        Ok(handle)
    }

    // ---------------------------------------------------------------
    // Field writes
    // ---------------------------------------------------------------

    /// Write text into an existing scalar field.
    pub fn set_scalar(&mut self, handle: &Handle, index: usize, value: impl Into<String>) -> StoreResult<()> {
        let record = self.record(handle)?;
        self.check_index(record, index, FieldKind::Scalar)?;

        let value = value.into();
        if record.field(index).and_then(FieldSlot::as_scalar) == Some(value.as_str()) {
            return Ok(());
        }
        if let Some(target) = record.field(index).and_then(FieldSlot::as_pointer) {
            self.unlink(*handle, index, target);
        }
        self.slot_mut(handle, index, FieldSlot::Scalar(value));

        self.events.stage(StoreEvent::Changed {
            handle: *handle,
            field_index: index,
        });
        self.events.flush();
        Ok(())
    }

    /// Point an existing pointer field at `target` (or clear it with the null
    /// handle). Setting the current value again is a successful no-op.
    pub fn set_pointer(&mut self, handle: &Handle, index: usize, target: Handle) -> StoreResult<()> {
        let record = self.record(handle)?;
        self.check_index(record, index, FieldKind::Pointer)?;
        if !target.is_null() {
            self.check_target(*handle, record.record_type(), index, target)?;
        }

        let current = record.field(index);
        if current == Some(&FieldSlot::Pointer(target)) {
            return Ok(());
        }
        if let Some(old) = current.and_then(FieldSlot::as_pointer) {
            self.unlink(*handle, index, old);
        }
        self.slot_mut(handle, index, FieldSlot::Pointer(target));
        if !target.is_null() {
            self.link(*handle, index, target);
        }
        debug!(source = %handle.short_id(), index, target = ?target, "pointer set");

        self.events.stage(StoreEvent::Changed {
            handle: *handle,
            field_index: index,
        });
        self.events.flush();
        Ok(())
    }

    /// Clear a pointer field.
    pub fn clear_pointer(&mut self, handle: &Handle, index: usize) -> StoreResult<()> {
        self.set_pointer(handle, index, Handle::null())
    }

    /// Replace every field of a record at once.
    ///
    /// The new slots are validated as a unit; on success the old pointers are
    /// unlinked and the new ones linked. A short list is padded with empty
    /// slots up to the type's minimum field count, as in [`create`]. Returns
    /// the indices whose value changed.
    ///
    /// [`create`]: RecordStore::create
    pub fn set_fields(&mut self, handle: &Handle, fields: Vec<FieldSlot>) -> StoreResult<Vec<usize>> {
        let record = self.record(handle)?;
        let record_type = record.record_type().clone();
        let layout = self.layout_of(&record_type)?;
        for (index, slot) in fields.iter().enumerate() {
            self.check_slot(*handle, &record_type, index, slot, fields.len())?;
        }
        let fields = self.pad_to_min(&record_type, &layout, fields);

        let changed: Vec<usize> = (0..record.field_count().max(fields.len()))
            .filter(|i| record.field(*i) != fields.get(*i))
            .collect();
        if changed.is_empty() {
            return Ok(changed);
        }

        let old_pointers: Vec<_> = record.forward_pointers().collect();
        for fp in old_pointers {
            self.unlink(fp.source, fp.field_index, fp.target);
        }
        if let Some(record) = self.records.get_mut(handle) {
            *record.fields_mut() = fields;
        }
        let new_pointers: Vec<_> = self.forward_pointers(handle);
        for fp in new_pointers {
            self.link(fp.source, fp.field_index, fp.target);
        }

        for &field_index in &changed {
            self.events.stage(StoreEvent::Changed {
                handle: *handle,
                field_index,
            });
        }
        self.events.flush();
        Ok(changed)
    }

    // ---------------------------------------------------------------
    // Extensible groups
    // ---------------------------------------------------------------

    /// Append a scalar slot at the tail. Returns its index.
    pub fn push_scalar(&mut self, handle: &Handle, value: impl Into<String>) -> StoreResult<usize> {
        self.push_slot(handle, FieldSlot::Scalar(value.into()))
    }

    /// Append a pointer slot at the tail. Returns its index.
    pub fn push_pointer(&mut self, handle: &Handle, target: Handle) -> StoreResult<usize> {
        self.push_slot(handle, FieldSlot::Pointer(target))
    }

    fn push_slot(&mut self, handle: &Handle, slot: FieldSlot) -> StoreResult<usize> {
        let record = self.record(handle)?;
        let record_type = record.record_type().clone();
        let index = record.field_count();
        self.layout_of(&record_type)?;
        self.check_slot(*handle, &record_type, index, &slot, index)?;

        let target = slot.as_pointer();
        if let Some(record) = self.records.get_mut(handle) {
            record.fields_mut().push(slot);
        }
        if let Some(target) = target {
            self.link(*handle, index, target);
        }

        self.events.stage(StoreEvent::Changed {
            handle: *handle,
            field_index: index,
        });
        self.events.flush();
        Ok(index)
    }

    /// Remove the last extensible group (or the trailing partial group) and
    /// return its slots. Pointers in the popped slots are unlinked.
    pub fn pop_extensible_group(&mut self, handle: &Handle) -> StoreResult<Vec<FieldSlot>> {
        let record = self.record(handle)?;
        let layout = self.layout_of(record.record_type())?;
        let group = layout
            .extensible_group
            .filter(|g| *g > 0)
            .ok_or(StoreError::NotExtensible(*handle))?;
        let count = record.field_count();
        let extensible = count.saturating_sub(layout.fixed_fields);
        if extensible == 0 {
            return Err(StoreError::NotExtensible(*handle));
        }
        let pop = match extensible % group {
            0 => group,
            partial => partial,
        };
        let keep = count - pop;

        let doomed: Vec<_> = record
            .forward_pointers()
            .filter(|fp| fp.field_index >= keep)
            .collect();
        for fp in doomed {
            self.unlink(fp.source, fp.field_index, fp.target);
        }
        let popped = match self.records.get_mut(handle) {
            Some(record) => record.fields_mut().split_off(keep),
            None => Vec::new(),
        };

        for field_index in keep..count {
            self.events.stage(StoreEvent::Changed {
                handle: *handle,
                field_index,
            });
        }
        self.events.flush();
        Ok(popped)
    }

    // ---------------------------------------------------------------
    // Internal primitives
    // ---------------------------------------------------------------

    /// Null out a pointer slot and drop its reverse entry. Used by removal;
    /// returns the old target if the slot held one.
    pub(crate) fn nullify_pointer(&mut self, handle: &Handle, index: usize) -> Option<Handle> {
        let old = self.records.get(handle)?.field(index)?.as_pointer()?;
        self.unlink(*handle, index, old);
        self.slot_mut(handle, index, FieldSlot::Pointer(Handle::null()));
        self.events.stage(StoreEvent::Changed {
            handle: *handle,
            field_index: index,
        });
        Some(old)
    }

    /// Append empty slots until `fields` reaches the layout's minimum.
    fn pad_to_min(&self, record_type: &RecordType, layout: &RecordLayout, mut fields: Vec<FieldSlot>) -> Vec<FieldSlot> {
        while fields.len() < layout.min_fields {
            match self.schema.field_kind(record_type, fields.len()) {
                Some(kind) => fields.push(FieldSlot::empty(kind)),
                None => break,
            }
        }
        fields
    }

    fn link(&mut self, source: Handle, field_index: usize, target: Handle) {
        self.index.insert(
            target,
            ReversePointer {
                source,
                field_index,
            },
        );
    }

    fn unlink(&mut self, source: Handle, field_index: usize, target: Handle) {
        self.index.remove(
            target,
            &ReversePointer {
                source,
                field_index,
            },
        );
    }

    fn slot_mut(&mut self, handle: &Handle, index: usize, slot: FieldSlot) {
        if let Some(existing) = self
            .records
            .get_mut(handle)
            .and_then(|r| r.fields_mut().get_mut(index))
        {
            *existing = slot;
        }
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    fn record(&self, handle: &Handle) -> StoreResult<&Record> {
        self.records.get(handle).ok_or(StoreError::NotFound(*handle))
    }

    fn layout_of(&self, record_type: &RecordType) -> StoreResult<RecordLayout> {
        self.schema
            .layout(record_type)
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.clone()))
    }

    /// `index` must be an existing slot whose schema kind is `expected`.
    fn check_index(&self, record: &Record, index: usize, expected: FieldKind) -> StoreResult<()> {
        self.layout_of(record.record_type())?;
        let out_of_range = || StoreError::IndexOutOfRange {
            handle: record.handle(),
            index,
            field_count: record.field_count(),
        };
        if index >= record.field_count() {
            return Err(out_of_range());
        }
        match self.schema.field_kind(record.record_type(), index) {
            None => Err(out_of_range()),
            Some(kind) if kind != expected => Err(StoreError::WrongFieldKind {
                handle: record.handle(),
                index,
                expected: kind,
            }),
            Some(_) => Ok(()),
        }
    }

    /// `slot` must be a legal value for field `index` of a `record_type` record.
    fn check_slot(
        &self,
        handle: Handle,
        record_type: &RecordType,
        index: usize,
        slot: &FieldSlot,
        field_count: usize,
    ) -> StoreResult<()> {
        let kind = self
            .schema
            .field_kind(record_type, index)
            .ok_or(StoreError::IndexOutOfRange {
                handle,
                index,
                field_count,
            })?;
        if slot.kind() != kind {
            return Err(StoreError::WrongFieldKind {
                handle,
                index,
                expected: kind,
            });
        }
        if let Some(target) = slot.as_pointer() {
            self.check_target(handle, record_type, index, target)?;
        }
        Ok(())
    }

    /// `target` must exist here and be an accepted type for the field.
    fn check_target(&self, handle: Handle, record_type: &RecordType, index: usize, target: Handle) -> StoreResult<()> {
        let target_record = self.records.get(&target).ok_or(StoreError::DanglingTarget {
            handle,
            index,
            target,
        })?;
        if !self
            .schema
            .can_target(record_type, index, target_record.record_type())
        {
            return Err(StoreError::TypeMismatch {
                handle,
                index,
                target,
                target_type: target_record.record_type().clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assert_consistent, rt, space_type, store, surface, zone};

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    #[test]
    fn create_pads_to_min_fields() {
        let mut store = store();
        let z = zone(&mut store, "Core");
        assert_eq!(store.field_count(&z), 2);
        assert_eq!(store.get(&z).unwrap().field(1), Some(&FieldSlot::Pointer(Handle::null())));
        assert_eq!(store.drain_events(), vec![StoreEvent::Added(z)]);
    }

    #[test]
    fn create_links_initial_pointers() {
        let mut store = store();
        let z = zone(&mut store, "Core");
        let s = surface(&mut store, "Floor", z);
        let rps = store.reverse_pointers(&z);
        assert_eq!(rps, vec![ReversePointer { source: s, field_index: 2 }]);
        assert_consistent(&store);
    }

    #[test]
    fn create_rejects_null_and_duplicate_handles() {
        let mut store = store();
        let err = store.create_with_handle(Handle::null(), rt("Zone"), vec![]).unwrap_err();
        assert_eq!(err, StoreError::NullHandle);

        let h = Handle::from_u128(7);
        store.create_with_handle(h, rt("Zone"), vec![]).unwrap();
        let err = store.create_with_handle(h, rt("Zone"), vec![]).unwrap_err();
        assert_eq!(err, StoreError::DuplicateHandle(h));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn create_rejects_unknown_type() {
        let mut store = store();
        let err = store.create(rt("Chiller"), vec![]).unwrap_err();
        assert_eq!(err, StoreError::UnknownRecordType(rt("Chiller")));
        assert!(store.is_empty());
    }

    #[test]
    fn create_rejects_bad_initial_fields() {
        let mut store = store();
        let z = zone(&mut store, "Core");

        let err = store
            .create(rt("Zone"), vec![FieldSlot::pointer(z)])
            .unwrap_err();
        assert!(matches!(err, StoreError::WrongFieldKind { index: 0, expected: FieldKind::Scalar, .. }));

        let err = store
            .create(rt("Zone"), vec![FieldSlot::scalar("a"), FieldSlot::pointer(Handle::new())])
            .unwrap_err();
        assert!(matches!(err, StoreError::DanglingTarget { index: 1, .. }));

        let err = store
            .create(rt("Zone"), vec![FieldSlot::scalar("a"), FieldSlot::pointer(z)])
            .unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { index: 1, .. }));

        let err = store
            .create(
                rt("Zone"),
                vec![FieldSlot::scalar("a"), FieldSlot::pointer(Handle::null()), FieldSlot::scalar("x")],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { index: 2, .. }));

        assert_eq!(store.len(), 1);
        assert_consistent(&store);
    }

    // -----------------------------------------------------------------------
    // Pointer writes
    // -----------------------------------------------------------------------

    #[test]
    fn set_pointer_moves_reverse_entry() {
        let mut store = store();
        let st1 = space_type(&mut store, "Office");
        let st2 = space_type(&mut store, "Lobby");
        let z = zone(&mut store, "Core");

        store.set_pointer(&z, 1, st1).unwrap();
        assert_eq!(store.sources(&st1), vec![z]);

        store.set_pointer(&z, 1, st2).unwrap();
        assert!(store.sources(&st1).is_empty());
        assert_eq!(store.sources(&st2), vec![z]);
        assert_eq!(store.get_pointer(&z, 1), Some(st2));
        assert_consistent(&store);
    }

    #[test]
    fn set_pointer_same_target_is_silent_noop() {
        let mut store = store();
        let st = space_type(&mut store, "Office");
        let z = zone(&mut store, "Core");
        store.set_pointer(&z, 1, st).unwrap();
        store.drain_events();

        store.set_pointer(&z, 1, st).unwrap();
        assert!(store.drain_events().is_empty());
        assert_eq!(store.reverse_pointers(&st).len(), 1);
    }

    #[test]
    fn clear_pointer_unlinks() {
        let mut store = store();
        let st = space_type(&mut store, "Office");
        let z = zone(&mut store, "Core");
        store.set_pointer(&z, 1, st).unwrap();
        store.clear_pointer(&z, 1).unwrap();
        assert_eq!(store.get_pointer(&z, 1), None);
        assert!(store.reverse_pointers(&st).is_empty());
        assert_consistent(&store);
    }

    #[test]
    fn set_pointer_validation_errors() {
        let mut store = store();
        let z = zone(&mut store, "Core");
        let other = zone(&mut store, "Perimeter");

        let missing = Handle::new();
        assert_eq!(
            store.set_pointer(&missing, 1, z).unwrap_err(),
            StoreError::NotFound(missing)
        );
        assert!(matches!(
            store.set_pointer(&z, 5, Handle::null()).unwrap_err(),
            StoreError::IndexOutOfRange { index: 5, field_count: 2, .. }
        ));
        assert!(matches!(
            store.set_pointer(&z, 0, Handle::null()).unwrap_err(),
            StoreError::WrongFieldKind { expected: FieldKind::Scalar, .. }
        ));
        assert!(matches!(
            store.set_pointer(&z, 1, Handle::new()).unwrap_err(),
            StoreError::DanglingTarget { .. }
        ));
        assert!(matches!(
            store.set_pointer(&z, 1, other).unwrap_err(),
            StoreError::TypeMismatch { .. }
        ));
        assert_eq!(store.get_pointer(&z, 1), None);
        assert_consistent(&store);
    }

    // -----------------------------------------------------------------------
    // Scalar writes
    // -----------------------------------------------------------------------

    #[test]
    fn set_scalar_writes_text_and_emits_change() {
        let mut store = store();
        let z = zone(&mut store, "Core");
        store.drain_events();

        store.set_scalar(&z, 0, "Perimeter").unwrap();
        assert_eq!(store.get_scalar(&z, 0, false).as_deref(), Some("Perimeter"));
        assert_eq!(
            store.drain_events(),
            vec![StoreEvent::Changed { handle: z, field_index: 0 }]
        );

        store.set_scalar(&z, 0, "Perimeter").unwrap();
        assert!(store.drain_events().is_empty());
    }

    #[test]
    fn set_scalar_on_pointer_field_fails() {
        let mut store = store();
        let z = zone(&mut store, "Core");
        assert!(matches!(
            store.set_scalar(&z, 1, "x").unwrap_err(),
            StoreError::WrongFieldKind { expected: FieldKind::Pointer, .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Whole-record writes
    // -----------------------------------------------------------------------

    #[test]
    fn set_fields_relinks_and_reports_changes() {
        let mut store = store();
        let st = space_type(&mut store, "Office");
        let z = zone(&mut store, "Core");
        store.drain_events();

        let changed = store
            .set_fields(&z, vec![FieldSlot::scalar("Core"), FieldSlot::pointer(st)])
            .unwrap();
        assert_eq!(changed, vec![1]);
        assert_eq!(store.sources(&st), vec![z]);
        assert_eq!(
            store.drain_events(),
            vec![StoreEvent::Changed { handle: z, field_index: 1 }]
        );

        let changed = store.set_fields(&z, vec![FieldSlot::scalar("Core")]).unwrap();
        assert_eq!(changed, vec![1]);
        assert_eq!(store.field_count(&z), 2);
        assert_eq!(store.get(&z).unwrap().field(1), Some(&FieldSlot::Pointer(Handle::null())));
        assert!(store.sources(&st).is_empty());
        assert_consistent(&store);
    }

    #[test]
    fn set_fields_never_drops_fixed_fields() {
        let mut store = store();
        let st = space_type(&mut store, "Office");
        let z = zone(&mut store, "Core");
        store.set_pointer(&z, 1, st).unwrap();

        let changed = store.set_fields(&z, vec![]).unwrap();
        assert_eq!(changed, vec![0, 1]);
        assert_eq!(store.field_count(&z), 2);
        assert_eq!(store.get_scalar(&z, 0, false).as_deref(), Some(""));
        assert!(store.sources(&st).is_empty());

        store.set_pointer(&z, 1, st).unwrap();
        assert_eq!(store.sources(&st), vec![z]);
        assert_consistent(&store);
    }

    #[test]
    fn set_fields_keeps_extensible_tail_above_minimum() {
        let mut store = store();
        let a = zone(&mut store, "A");
        let list = store
            .create(rt("ZoneList"), vec![FieldSlot::scalar("All"), FieldSlot::pointer(a)])
            .unwrap();

        store.set_fields(&list, vec![FieldSlot::scalar("All")]).unwrap();
        assert_eq!(store.field_count(&list), 1);
        assert!(store.sources(&a).is_empty());
        assert_consistent(&store);
    }

    #[test]
    fn set_fields_is_all_or_nothing() {
        let mut store = store();
        let st = space_type(&mut store, "Office");
        let z = zone(&mut store, "Core");
        store.set_pointer(&z, 1, st).unwrap();

        let err = store
            .set_fields(&z, vec![FieldSlot::scalar("New"), FieldSlot::pointer(Handle::new())])
            .unwrap_err();
        assert!(matches!(err, StoreError::DanglingTarget { .. }));
        assert_eq!(store.name(&z).as_deref(), Some("Core"));
        assert_eq!(store.get_pointer(&z, 1), Some(st));
    }

    // -----------------------------------------------------------------------
    // Extensible groups
    // -----------------------------------------------------------------------

    #[test]
    fn push_pointer_grows_extensible_record() {
        let mut store = store();
        let a = zone(&mut store, "A");
        let b = zone(&mut store, "B");
        let list = store
            .create(rt("ZoneList"), vec![FieldSlot::scalar("All")])
            .unwrap();

        assert_eq!(store.push_pointer(&list, a).unwrap(), 1);
        assert_eq!(store.push_pointer(&list, b).unwrap(), 2);
        assert_eq!(store.targets(&list), vec![a, b]);
        assert_eq!(store.sources(&b), vec![list]);
        assert_consistent(&store);
    }

    #[test]
    fn push_on_fixed_record_is_out_of_range() {
        let mut store = store();
        let z = zone(&mut store, "Core");
        assert!(matches!(
            store.push_scalar(&z, "x").unwrap_err(),
            StoreError::IndexOutOfRange { index: 2, .. }
        ));
        assert_eq!(store.field_count(&z), 2);
    }

    #[test]
    fn push_checks_kind_of_grown_index() {
        let mut store = store();
        let list = store.create(rt("ZoneList"), vec![]).unwrap();
        assert!(matches!(
            store.push_scalar(&list, "x").unwrap_err(),
            StoreError::WrongFieldKind { index: 1, .. }
        ));
    }

    #[test]
    fn pop_unlinks_popped_pointers() {
        let mut store = store();
        let a = zone(&mut store, "A");
        let list = store
            .create(rt("ZoneList"), vec![FieldSlot::scalar("All")])
            .unwrap();
        store.push_pointer(&list, a).unwrap();

        let popped = store.pop_extensible_group(&list).unwrap();
        assert_eq!(popped, vec![FieldSlot::pointer(a)]);
        assert_eq!(store.field_count(&list), 1);
        assert!(store.sources(&a).is_empty());
        assert_consistent(&store);

        assert_eq!(
            store.pop_extensible_group(&list).unwrap_err(),
            StoreError::NotExtensible(list)
        );
    }

    #[test]
    fn pop_on_fixed_record_fails() {
        let mut store = store();
        let z = zone(&mut store, "Core");
        assert_eq!(
            store.pop_extensible_group(&z).unwrap_err(),
            StoreError::NotExtensible(z)
        );
    }
}
