//! Clone planning: pick the records, mint handles, resolve pointers, and
//! check the result against the destination schema.

use std::collections::{HashSet, VecDeque};

use tracing::debug;
use wsg_store::naming::next_name_among;
use wsg_store::{FieldSlot, Record, RecordStore, StoreError, StoreResult};
use wsg_types::{Handle, HandleMap, RecordType};

use crate::error::{CloneError, CloneResult};

/// Records to clone: the seeds present in `src`, plus everything they
/// transitively point to when `transitive` is set. Returned in `src`
/// insertion order.
pub fn closure(src: &RecordStore, seeds: impl IntoIterator<Item = Handle>, transitive: bool) -> Vec<Handle> {
    let mut selected: HashSet<Handle> = seeds.into_iter().filter(|h| src.contains(h)).collect();
    if transitive {
        let mut queue: VecDeque<Handle> = selected.iter().copied().collect();
        while let Some(handle) = queue.pop_front() {
            for target in src.targets(&handle) {
                if selected.insert(target) {
                    queue.push_back(target);
                }
            }
        }
    }
    src.records()
        .map(Record::handle)
        .filter(|h| selected.contains(h))
        .collect()
}

/// One record as it will be created in the destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedRecord {
    /// Handle of the original in the source store.
    pub source: Handle,
    /// Freshly minted handle in the destination.
    pub handle: Handle,
    pub record_type: RecordType,
    /// Field values with pointers already resolved.
    pub fields: Vec<FieldSlot>,
}

/// A fully resolved clone, ready to apply.
#[derive(Clone, Debug, Default)]
pub struct ClonePlan {
    records: Vec<PlannedRecord>,
    map: HandleMap,
}

impl ClonePlan {
    /// Plan a clone of exactly `handles` from `src` into `dest`.
    ///
    /// No closure is computed here. Pointers resolve to a record cloned by
    /// this plan first, then through `fallback` (source handle to an existing
    /// destination handle), then to the same handle if `dest` has it, and are
    /// cleared otherwise. Handles absent from `src` are skipped.
    pub fn new(src: &RecordStore, handles: &[Handle], dest: &RecordStore, fallback: &HandleMap) -> CloneResult<Self> {
        let mut map = HandleMap::new();
        let mut minted = HashSet::new();
        let mut order = Vec::with_capacity(handles.len());
        for handle in handles {
            if src.contains(handle) && !map.contains_key(handle) {
                let fresh = fresh_handle(dest, &mut minted);
                map.insert(*handle, fresh);
                order.push(*handle);
            }
        }

        let schema = dest.schema();
        let mut records = Vec::with_capacity(order.len());
        for source in order {
            let (Some(record), Some(&handle)) = (src.get(&source), map.get(&source)) else {
                continue;
            };
            let record_type = record.record_type();
            if !schema.is_known(record_type) {
                return Err(CloneError::UnknownRecordType(record_type.clone()));
            }

            let mut fields = Vec::with_capacity(record.field_count());
            for (index, slot) in record.fields().iter().enumerate() {
                let kind = schema
                    .field_kind(record_type, index)
                    .ok_or(StoreError::IndexOutOfRange {
                        handle,
                        index,
                        field_count: record.field_count(),
                    })?;
                if slot.kind() != kind {
                    return Err(StoreError::WrongFieldKind {
                        handle,
                        index,
                        expected: kind,
                    }
                    .into());
                }
                let resolved = match slot {
                    FieldSlot::Scalar(_) => slot.clone(),
                    FieldSlot::Pointer(old) => match resolve(*old, &map, fallback, src, dest) {
                        Some((target, target_type)) => {
                            if !schema.can_target(record_type, index, target_type) {
                                return Err(StoreError::TypeMismatch {
                                    handle,
                                    index,
                                    target,
                                    target_type: target_type.clone(),
                                }
                                .into());
                            }
                            FieldSlot::Pointer(target)
                        }
                        None => FieldSlot::Pointer(Handle::null()),
                    },
                };
                fields.push(resolved);
            }

            records.push(PlannedRecord {
                source,
                handle,
                record_type: record_type.clone(),
                fields,
            });
        }

        Ok(Self { records, map })
    }

    /// Old-to-new handle map.
    pub fn map(&self) -> &HandleMap {
        &self.map
    }

    pub fn records(&self) -> &[PlannedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rename planned records whose names collide in `dest`.
    ///
    /// A name collides when a destination record, or a record planned
    /// earlier, has the same name ignoring case and shares a naming scope.
    /// A colliding record takes the next name in its series, counting both
    /// existing and planned names. Returns the number of records renamed.
    pub fn resolve_name_conflicts(&mut self, dest: &RecordStore) -> usize {
        let schema = dest.schema();
        let mut claimed: Vec<(RecordType, String)> = Vec::new();
        let mut renamed = 0;

        for planned in &mut self.records {
            let Some(index) = schema.layout(&planned.record_type).and_then(|l| l.name_field) else {
                continue;
            };
            let Some(name) = planned.fields.get(index).and_then(FieldSlot::as_scalar) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let mut name = name.to_string();

            if collides(dest, &claimed, &planned.record_type, &name) {
                let next = if dest.config().fast_naming {
                    None
                } else {
                    let mut existing: Vec<String> = dest
                        .records_by_name(&name, false)
                        .into_iter()
                        .filter_map(|r| dest.name(&r.handle()))
                        .collect();
                    existing.extend(claimed.iter().map(|(_, n)| n.clone()));
                    next_name_among(&name, existing.iter().map(String::as_str), false)
                };
                let next = next.unwrap_or_else(|| Handle::new().to_string());
                debug!(handle = %planned.handle.short_id(), from = %name, to = %next, "clone renamed");
                planned.fields[index] = FieldSlot::Scalar(next.clone());
                name = next;
                renamed += 1;
            }
            claimed.push((planned.record_type.clone(), name));
        }
        renamed
    }

    /// Create the planned records in `dest`.
    ///
    /// Records are created with their pointers unset, then pointers are
    /// filled in, so records may reference each other in any order. Events
    /// are delivered once, after the last write.
    pub fn apply(self, dest: &mut RecordStore) -> StoreResult<HandleMap> {
        let Self { records, map } = self;
        dest.batch(|dest| -> StoreResult<()> {
            for planned in &records {
                let unlinked = planned
                    .fields
                    .iter()
                    .map(|slot| match slot {
                        FieldSlot::Pointer(_) => FieldSlot::Pointer(Handle::null()),
                        scalar => scalar.clone(),
                    })
                    .collect();
                dest.create_with_handle(planned.handle, planned.record_type.clone(), unlinked)?;
            }
            for planned in &records {
                for (index, slot) in planned.fields.iter().enumerate() {
                    if let Some(target) = slot.as_pointer() {
                        dest.set_pointer(&planned.handle, index, target)?;
                    }
                }
            }
            Ok(())
        })?;
        Ok(map)
    }
}

fn collides(dest: &RecordStore, claimed: &[(RecordType, String)], record_type: &RecordType, name: &str) -> bool {
    dest.name_conflict(name, record_type, None)
        || claimed
            .iter()
            .any(|(ty, n)| n.eq_ignore_ascii_case(name) && dest.share_naming_scope(ty, record_type))
}

fn fresh_handle(dest: &RecordStore, minted: &mut HashSet<Handle>) -> Handle {
    loop {
        let handle = Handle::new();
        if !dest.contains(&handle) && minted.insert(handle) {
            return handle;
        }
    }
}

/// Where a pointer to `old` lands in the destination, and the target's type.
fn resolve<'a>(
    old: Handle,
    map: &HandleMap,
    fallback: &HandleMap,
    src: &'a RecordStore,
    dest: &'a RecordStore,
) -> Option<(Handle, &'a RecordType)> {
    if old.is_null() {
        return None;
    }
    if let Some(new) = map.get(&old) {
        return src.get(&old).map(|r| (*new, r.record_type()));
    }
    if let Some(existing) = fallback.get(&old) {
        if let Some(r) = dest.get(existing) {
            return Some((*existing, r.record_type()));
        }
    }
    dest.get(&old).map(|r| (old, r.record_type()))
}
