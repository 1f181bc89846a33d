//! Shared fixtures for unit tests.

use std::sync::Arc;

use wsg_schema::{FieldSpec, RecordTypeSpec, TableSchema};
use wsg_types::{Handle, RecordType};

use crate::{FieldSlot, RecordStore};

pub(crate) fn rt(s: &str) -> RecordType {
    RecordType::new(s).unwrap()
}

/// A small building model.
///
/// - `Building`: `[Name, North Axis="0"]`, unique, required
/// - `Zone`: `[Name, Space Type -> SpaceType]`
/// - `SpaceType`: `[Name]`
/// - `Surface`: `[Name, Kind="Wall", Zone -> Zone (required)]`
/// - `ZoneList`: `[Name]` then repeating `[Zone -> Zone]`
pub(crate) fn schema() -> Arc<TableSchema> {
    let schema = TableSchema::new([
        RecordTypeSpec::new("Building")
            .with_name_field()
            .field(FieldSpec::scalar("North Axis").with_default("0"))
            .unique()
            .required_type(),
        RecordTypeSpec::new("Zone")
            .with_name_field()
            .field(FieldSpec::pointer("Space Type", ["SpaceTypeNames"]))
            .references(["ZoneNames"]),
        RecordTypeSpec::new("SpaceType")
            .with_name_field()
            .references(["SpaceTypeNames"]),
        RecordTypeSpec::new("Surface")
            .with_name_field()
            .field(FieldSpec::scalar("Kind").with_default("Wall"))
            .field(FieldSpec::pointer("Zone", ["ZoneNames"]).required())
            .references(["SurfaceNames"]),
        RecordTypeSpec::new("ZoneList")
            .with_name_field()
            .extensible_field(FieldSpec::pointer("Zone", ["ZoneNames"]).required())
            .references(["ZoneListNames"]),
    ])
    .unwrap();
    Arc::new(schema)
}

pub(crate) fn store() -> RecordStore {
    RecordStore::new(schema())
}

pub(crate) fn zone(store: &mut RecordStore, name: &str) -> Handle {
    store
        .create(rt("Zone"), vec![FieldSlot::scalar(name)])
        .unwrap()
}

pub(crate) fn space_type(store: &mut RecordStore, name: &str) -> Handle {
    store
        .create(rt("SpaceType"), vec![FieldSlot::scalar(name)])
        .unwrap()
}

/// A surface whose field 2 points at `zone`.
pub(crate) fn surface(store: &mut RecordStore, name: &str, zone: Handle) -> Handle {
    store
        .create(
            rt("Surface"),
            vec![
                FieldSlot::scalar(name),
                FieldSlot::scalar(""),
                FieldSlot::pointer(zone),
            ],
        )
        .unwrap()
}

pub(crate) fn assert_consistent(store: &RecordStore) {
    let violations = store.integrity_violations();
    assert!(violations.is_empty(), "integrity violations: {violations:#?}");
}
