use std::collections::HashMap;

use tracing::{debug, info};
use wsg_clone::ClonePlan;
use wsg_store::{FieldSlot, Record, RecordStore, StoreError};
use wsg_types::{Handle, HandleMap, RecordType};

use crate::error::{MergeError, MergeResult};
use crate::report::MergeReport;

/// Reconcile `dest` with `src` under `mapping` (`dest handle -> src handle`).
///
/// Fails with [`MergeError::InvalidMapping`] if a key is not in `dest`, a
/// value is not in `src`, two keys share a value, or a pair's record types
/// differ. Nothing is written unless the whole merge is valid.
pub fn merge(dest: &mut RecordStore, src: &RecordStore, mapping: &HandleMap) -> MergeResult<MergeReport> {
    check_mapping(dest, src, mapping)?;
    let inverse: HandleMap = mapping.iter().map(|(d, s)| (*s, *d)).collect();

    let doomed: Vec<Handle> = dest
        .records()
        .map(Record::handle)
        .filter(|h| !mapping.contains_key(h))
        .collect();
    let fresh: Vec<Handle> = src
        .records()
        .map(Record::handle)
        .filter(|h| !inverse.contains_key(h))
        .collect();

    let plan = ClonePlan::new(src, &fresh, dest, &inverse)?;
    let updates = plan_updates(dest, src, mapping, &inverse, plan.map())?;
    debug!(
        removals = doomed.len(),
        additions = plan.len(),
        updates = updates.len(),
        "merge planned"
    );

    let report = dest.batch(|dest| -> MergeResult<MergeReport> {
        let removed = dest.remove_many(doomed.iter());
        let new_handles = plan.apply(dest)?;
        let mut updated = Vec::with_capacity(updates.len());
        for (handle, fields) in updates {
            if !dest.set_fields(&handle, fields)?.is_empty() {
                updated.push(handle);
            }
        }
        Ok(MergeReport {
            added: fresh.iter().filter_map(|h| new_handles.get(h).copied()).collect(),
            updated,
            removed: removed.removed,
            matched: mapping.len(),
            new_handles,
        })
    })?;

    info!(
        matched = report.matched,
        added = report.additions(),
        updated = report.updates(),
        removed = report.removals(),
        "merge complete"
    );
    Ok(report)
}

fn check_mapping(dest: &RecordStore, src: &RecordStore, mapping: &HandleMap) -> MergeResult<()> {
    let invalid = |d: Handle, s: Handle, reason: String| MergeError::InvalidMapping {
        dest: d,
        src: s,
        reason,
    };
    let mut claimed: HashMap<Handle, Handle> = HashMap::with_capacity(mapping.len());
    for (&d, &s) in mapping {
        let dest_record = dest
            .get(&d)
            .ok_or_else(|| invalid(d, s, "destination handle is not in the destination store".into()))?;
        let src_record = src
            .get(&s)
            .ok_or_else(|| invalid(d, s, "source handle is not in the source store".into()))?;
        if dest_record.record_type() != src_record.record_type() {
            return Err(invalid(
                d,
                s,
                format!(
                    "record types differ ({} vs {})",
                    dest_record.record_type(),
                    src_record.record_type()
                ),
            ));
        }
        if let Some(other) = claimed.insert(s, d) {
            return Err(invalid(d, s, format!("source handle is also mapped from {other}")));
        }
    }
    Ok(())
}

/// Source fields for every matched record, resolved into destination
/// handles and padded to the type's minimum field count. Only records whose
/// fields would change are returned, in destination order.
fn plan_updates(
    dest: &RecordStore,
    src: &RecordStore,
    mapping: &HandleMap,
    inverse: &HandleMap,
    new_handles: &HandleMap,
) -> MergeResult<Vec<(Handle, Vec<FieldSlot>)>> {
    let schema = dest.schema();
    let mut updates = Vec::new();

    for dest_record in dest.records() {
        let handle = dest_record.handle();
        let Some(src_record) = mapping.get(&handle).and_then(|s| src.get(s)) else {
            continue;
        };
        let record_type = dest_record.record_type();

        let mut fields = Vec::with_capacity(src_record.field_count());
        for (index, slot) in src_record.fields().iter().enumerate() {
            let kind = schema
                .field_kind(record_type, index)
                .ok_or(StoreError::IndexOutOfRange {
                    handle,
                    index,
                    field_count: src_record.field_count(),
                })?;
            if slot.kind() != kind {
                return Err(StoreError::WrongFieldKind {
                    handle,
                    index,
                    expected: kind,
                }
                .into());
            }
            let resolved = match slot.as_pointer() {
                None => slot.clone(),
                Some(old) => match resolve(old, dest, src, inverse, new_handles) {
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
        let min_fields = schema.layout(record_type).map_or(0, |l| l.min_fields);
        while fields.len() < min_fields {
            match schema.field_kind(record_type, fields.len()) {
                Some(kind) => fields.push(FieldSlot::empty(kind)),
                None => break,
            }
        }

        if fields.as_slice() != dest_record.fields() {
            updates.push((handle, fields));
        }
    }
    Ok(updates)
}

/// Destination handle for a source pointer target: the matched record, or
/// the record cloned in for it.
fn resolve<'a>(
    old: Handle,
    dest: &'a RecordStore,
    src: &'a RecordStore,
    inverse: &HandleMap,
    new_handles: &HandleMap,
) -> Option<(Handle, &'a RecordType)> {
    if let Some(matched) = inverse.get(&old) {
        return dest.get(matched).map(|r| (*matched, r.record_type()));
    }
    let new = new_handles.get(&old)?;
    src.get(&old).map(|r| (*new, r.record_type()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wsg_clone::{clone_records, clone_store};
    use wsg_schema::{FieldSpec, RecordTypeSpec, TableSchema};
    use wsg_store::{StoreConfig, StoreEvent, StoreSnapshot};

    use super::*;

    fn rt(s: &str) -> RecordType {
        RecordType::new(s).unwrap()
    }

    fn schema() -> Arc<TableSchema> {
        let schema = TableSchema::new([
            RecordTypeSpec::new("Zone")
                .with_name_field()
                .field(FieldSpec::pointer("Space Type", ["SpaceTypeNames"]))
                .references(["ZoneNames"]),
            RecordTypeSpec::new("SpaceType")
                .with_name_field()
                .references(["SpaceTypeNames"]),
            RecordTypeSpec::new("Surface")
                .with_name_field()
                .field(FieldSpec::scalar("Kind"))
                .field(FieldSpec::pointer("Zone", ["ZoneNames"]))
                .references(["SurfaceNames"]),
        ])
        .unwrap();
        Arc::new(schema)
    }

    fn store() -> RecordStore {
        RecordStore::new(schema())
    }

    fn named(store: &mut RecordStore, ty: &str, name: &str) -> Handle {
        store.create(rt(ty), vec![FieldSlot::scalar(name)]).unwrap()
    }

    fn surface(store: &mut RecordStore, name: &str, zone: Handle) -> Handle {
        store
            .create(
                rt("Surface"),
                vec![FieldSlot::scalar(name), FieldSlot::scalar("Wall"), FieldSlot::pointer(zone)],
            )
            .unwrap()
    }

    fn assert_consistent(store: &RecordStore) {
        assert!(store.integrity_violations().is_empty());
    }

    // -----------------------------------------------------------------------
    // Identity and clobber
    // -----------------------------------------------------------------------

    #[test]
    fn identity_mapping_on_identical_graph_is_noop() {
        let mut dest = store();
        let st = named(&mut dest, "SpaceType", "Office");
        let z = named(&mut dest, "Zone", "Core");
        dest.set_pointer(&z, 1, st).unwrap();
        surface(&mut dest, "Floor", z);
        let (src, identity) = clone_store(&dest, true).unwrap();
        let before = dest.snapshot();
        dest.drain_events();

        let report = merge(&mut dest, &src, &identity).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.matched, 3);
        assert_eq!(dest.snapshot(), before);
        assert!(dest.drain_events().is_empty());
    }

    #[test]
    fn mapping_through_fresh_clone_is_noop() {
        let mut dest = store();
        let z = named(&mut dest, "Zone", "Core");
        surface(&mut dest, "Floor", z);
        let (src, old_to_new) = clone_store(&dest, false).unwrap();
        let before = dest.snapshot();

        let report = merge(&mut dest, &src, &old_to_new).unwrap();
        assert!(report.is_noop());
        assert_eq!(dest.snapshot(), before);
    }

    #[test]
    fn empty_mapping_clobbers() {
        let mut dest = store();
        let originals: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|n| named(&mut dest, "Zone", n))
            .collect();
        let mut src = store();
        let z = named(&mut src, "Zone", "X");
        surface(&mut src, "Y", z);

        let report = merge(&mut dest, &src, &HandleMap::new()).unwrap();
        assert_eq!(dest.len(), 2);
        assert_eq!(report.removed, originals);
        assert_eq!(report.added.len(), 2);
        assert!(originals.iter().all(|h| !dest.contains(h)));
        assert!(report.added.iter().all(|h| !src.contains(h)));

        let y = report.new_handles[&src.handles()[1]];
        assert_eq!(dest.get_pointer(&y, 2), Some(report.new_handles[&z]));
        assert_consistent(&dest);
    }

    // -----------------------------------------------------------------------
    // Pointer resolution
    // -----------------------------------------------------------------------

    #[test]
    fn new_record_points_at_matched_record() {
        let mut dest = store();
        let dz = named(&mut dest, "Zone", "Core");
        let mut src = store();
        let sz = named(&mut src, "Zone", "Core");
        let ss = surface(&mut src, "Floor", sz);

        let report = merge(&mut dest, &src, &HandleMap::from([(dz, sz)])).unwrap();
        let new_surface = report.new_handles[&ss];
        assert_eq!(dest.get_pointer(&new_surface, 2), Some(dz));
        assert_eq!(dest.sources(&dz), vec![new_surface]);
        assert!(report.updated.is_empty());
        assert_consistent(&dest);
    }

    #[test]
    fn matched_record_points_at_new_record() {
        let mut dest = store();
        let dz = named(&mut dest, "Zone", "Core");
        let mut src = store();
        let st = named(&mut src, "SpaceType", "Office");
        let sz = src
            .create(rt("Zone"), vec![FieldSlot::scalar("Core"), FieldSlot::pointer(st)])
            .unwrap();

        let report = merge(&mut dest, &src, &HandleMap::from([(dz, sz)])).unwrap();
        assert_eq!(report.updated, vec![dz]);
        let new_st = report.new_handles[&st];
        assert_eq!(dest.get_pointer(&dz, 1), Some(new_st));
        assert_consistent(&dest);
    }

    #[test]
    fn change_undone_by_removal_is_not_an_update() {
        let mut dest = store();
        let b2 = named(&mut dest, "Zone", "B");
        let a2 = surface(&mut dest, "A", b2);
        let mut src = store();
        let a = src
            .create(
                rt("Surface"),
                vec![FieldSlot::scalar("A"), FieldSlot::scalar("Wall"), FieldSlot::pointer(Handle::null())],
            )
            .unwrap();

        let report = merge(&mut dest, &src, &HandleMap::from([(a2, a)])).unwrap();
        assert_eq!(report.removed, vec![b2]);
        assert!(report.updated.is_empty());
        assert_eq!(dest.get_pointer(&a2, 2), None);
        assert!(dest.get(&a2).unwrap().same_content(src.get(&a).unwrap()));
        assert_consistent(&dest);
    }

    #[test]
    fn short_source_record_keeps_fixed_fields() {
        let mut dest = store();
        let dz = named(&mut dest, "Zone", "Old");

        let mut full = store();
        let sz = named(&mut full, "Zone", "Core");
        let mut json = serde_json::to_value(full.snapshot()).unwrap();
        json["records"][0]["fields"].as_array_mut().unwrap().truncate(1);
        let snapshot: StoreSnapshot = serde_json::from_value(json).unwrap();
        let src = RecordStore::from_snapshot(schema(), StoreConfig::default(), snapshot).unwrap();
        assert_eq!(src.field_count(&sz), 1);

        let report = merge(&mut dest, &src, &HandleMap::from([(dz, sz)])).unwrap();
        assert_eq!(report.updated, vec![dz]);
        assert_eq!(dest.field_count(&dz), 2);
        assert_eq!(dest.name(&dz).as_deref(), Some("Core"));

        let st = named(&mut dest, "SpaceType", "Office");
        dest.set_pointer(&dz, 1, st).unwrap();
        assert_consistent(&dest);
    }

    // -----------------------------------------------------------------------
    // End-to-end scenario
    // -----------------------------------------------------------------------

    #[test]
    fn remove_clone_merge_scenario() {
        let mut original = store();
        let b = named(&mut original, "Zone", "B");
        let a = surface(&mut original, "A", b);

        let mut dest = store();
        let map = clone_records(&original, [a, b], &mut dest, true).unwrap();
        let (a2, b2) = (map[&a], map[&b]);
        assert_eq!(dest.get_pointer(&a2, 2), Some(b2));

        original.remove(&b);
        assert_eq!(original.get_pointer(&a, 2), None);
        assert!(original.reverse_pointers(&b).is_empty());
        original.set_scalar(&a, 1, "Roof").unwrap();
        let c = named(&mut original, "Zone", "C");
        dest.drain_events();

        let report = merge(&mut dest, &original, &HandleMap::from([(a2, a)])).unwrap();
        assert_eq!(report.updated, vec![a2]);
        assert_eq!(report.removed, vec![b2]);
        assert_eq!(report.added.len(), 1);
        let c2 = report.new_handles[&c];

        assert!(dest.get(&a2).unwrap().same_content(original.get(&a).unwrap()));
        assert!(!dest.contains(&b2));
        assert_eq!(dest.name(&c2).as_deref(), Some("C"));
        assert_eq!(dest.len(), 2);
        assert_consistent(&dest);

        let events = dest.drain_events();
        assert!(events.contains(&StoreEvent::Removed(b2)));
        assert!(events.contains(&StoreEvent::Added(c2)));
        assert!(events.contains(&StoreEvent::Changed { handle: a2, field_index: 1 }));
    }

    // -----------------------------------------------------------------------
    // Invalid mappings
    // -----------------------------------------------------------------------

    fn assert_rejected(dest: &mut RecordStore, src: &RecordStore, mapping: HandleMap) {
        let before = dest.snapshot();
        let err = merge(dest, src, &mapping).unwrap_err();
        assert!(matches!(err, MergeError::InvalidMapping { .. }), "{err}");
        assert_eq!(dest.snapshot(), before);
    }

    #[test]
    fn key_missing_from_dest() {
        let mut dest = store();
        let mut src = store();
        let s = named(&mut src, "Zone", "X");
        assert_rejected(&mut dest, &src, HandleMap::from([(Handle::new(), s)]));
    }

    #[test]
    fn value_missing_from_src() {
        let mut dest = store();
        let d = named(&mut dest, "Zone", "X");
        let src = store();
        assert_rejected(&mut dest, &src, HandleMap::from([(d, Handle::new())]));
    }

    #[test]
    fn two_keys_share_a_value() {
        let mut dest = store();
        let d1 = named(&mut dest, "Zone", "X");
        let d2 = named(&mut dest, "Zone", "Y");
        let mut src = store();
        let s = named(&mut src, "Zone", "X");
        assert_rejected(&mut dest, &src, HandleMap::from([(d1, s), (d2, s)]));
    }

    #[test]
    fn pair_types_differ() {
        let mut dest = store();
        let d = named(&mut dest, "Zone", "X");
        let mut src = store();
        let s = named(&mut src, "SpaceType", "X");
        assert_rejected(&mut dest, &src, HandleMap::from([(d, s)]));
    }
}
