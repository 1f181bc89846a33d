use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;
use wsg_store::{Record, RecordStore};
use wsg_types::{Handle, HandleMap, RecordType};

/// Propose a `dest -> src` mapping for [`merge`](crate::merge).
///
/// Passes run in order, each skipping records an earlier pass matched:
///
/// 1. the same handle with the same record type on both sides;
/// 2. records of a unique type, when exactly one is left on each side;
/// 3. records of the same type whose names agree, ignoring case.
///
/// Every source record is used at most once.
pub fn suggest_mapping(dest: &RecordStore, src: &RecordStore) -> HandleMap {
    let mut mapping = HandleMap::new();
    let mut used: HashSet<Handle> = HashSet::new();

    for record in dest.records() {
        let handle = record.handle();
        if src
            .get(&handle)
            .is_some_and(|other| other.record_type() == record.record_type())
        {
            mapping.insert(handle, handle);
            used.insert(handle);
        }
    }
    let by_handle = mapping.len();

    let schema = dest.schema();
    let unique_types: BTreeSet<&RecordType> = dest
        .records()
        .map(Record::record_type)
        .filter(|ty| schema.is_unique(ty))
        .collect();
    for ty in unique_types {
        let left: Vec<Handle> = dest
            .records_of_type(ty)
            .map(Record::handle)
            .filter(|h| !mapping.contains_key(h))
            .collect();
        let right: Vec<Handle> = src
            .records_of_type(ty)
            .map(Record::handle)
            .filter(|h| !used.contains(h))
            .collect();
        if let ([d], [s]) = (left.as_slice(), right.as_slice()) {
            mapping.insert(*d, *s);
            used.insert(*s);
        }
    }
    let by_uniqueness = mapping.len() - by_handle;

    let mut by_name: BTreeMap<(RecordType, String), Vec<Handle>> = BTreeMap::new();
    for record in src.records().filter(|r| !used.contains(&r.handle())) {
        if let Some(name) = src.name(&record.handle()) {
            by_name
                .entry((record.record_type().clone(), name.to_lowercase()))
                .or_default()
                .push(record.handle());
        }
    }
    for record in dest.records() {
        let handle = record.handle();
        if mapping.contains_key(&handle) {
            continue;
        }
        let Some(name) = dest.name(&handle) else {
            continue;
        };
        let key = (record.record_type().clone(), name.to_lowercase());
        let Some(candidates) = by_name.get_mut(&key) else {
            continue;
        };
        if let Some(pos) = candidates.iter().position(|s| !used.contains(s)) {
            let s = candidates.remove(pos);
            mapping.insert(handle, s);
            used.insert(s);
        }
    }

    debug!(
        by_handle,
        by_uniqueness,
        by_name = mapping.len() - by_handle - by_uniqueness,
        "mapping suggested"
    );
    mapping
}
