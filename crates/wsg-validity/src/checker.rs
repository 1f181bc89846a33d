use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use tracing::debug;
use wsg_schema::{FieldKind, ScopeId};
use wsg_store::{FieldSlot, Record, RecordStore};
use wsg_types::{Handle, RecordType};

use crate::options::{StrictnessLevel, ValidityOptions};
use crate::report::{ValidityReport, Violation, ViolationKind};

/// Check every record in the store.
pub fn validate(store: &RecordStore, options: &ValidityOptions) -> ValidityReport {
    let mut violations = Vec::new();

    if options.strictness > StrictnessLevel::None {
        for record in store.records() {
            check_fields(store, record, &mut violations);
        }
        if options.check_names {
            violations.extend(name_conflicts(store).into_iter().map(|(_, v)| v));
        }
        if options.strictness >= StrictnessLevel::Final {
            check_store_rules(store, &mut violations);
        }
    }

    debug!(
        records = store.len(),
        violations = violations.len(),
        strictness = ?options.strictness,
        "validity pass complete"
    );
    ValidityReport {
        strictness: options.strictness,
        record_count: store.len(),
        violations,
    }
}

/// Check a single record. Name conflicts are included when the record is
/// either side of a colliding pair.
pub fn validate_record(store: &RecordStore, handle: &Handle, options: &ValidityOptions) -> Vec<Violation> {
    let mut violations = Vec::new();
    let Some(record) = store.get(handle) else {
        return violations;
    };
    if options.strictness == StrictnessLevel::None {
        return violations;
    }
    check_fields(store, record, &mut violations);
    if options.check_names {
        violations.extend(
            name_conflicts(store)
                .into_iter()
                .filter(|(earlier, v)| earlier == handle || v.handle == Some(*handle))
                .map(|(_, v)| v),
        );
    }
    violations
}

fn check_fields(store: &RecordStore, record: &Record, out: &mut Vec<Violation>) {
    let schema = store.schema();
    let handle = record.handle();
    let record_type = record.record_type();
    let Some(layout) = schema.layout(record_type) else {
        out.push(Violation {
            handle: Some(handle),
            field_index: None,
            kind: ViolationKind::UnknownType,
            description: format!("record type {record_type} is not in the schema"),
        });
        return;
    };

    let span = record.field_count().max(layout.fixed_fields);
    for index in 0..span {
        let slot = record.field(index);
        let violation = |kind, description| Violation {
            handle: Some(handle),
            field_index: Some(index),
            kind,
            description,
        };

        let Some(kind) = schema.field_kind(record_type, index) else {
            if slot.is_some() {
                out.push(violation(
                    ViolationKind::FieldOutOfRange,
                    format!("{record_type} has no field {index}"),
                ));
            }
            continue;
        };

        if let Some(slot) = slot {
            if slot.kind() != kind {
                out.push(violation(
                    ViolationKind::WrongFieldKind,
                    format!("holds a {} value in a {kind} field", slot.kind()),
                ));
                continue;
            }
            if let Some(target) = slot.as_pointer() {
                match store.get(&target) {
                    None => out.push(violation(
                        ViolationKind::DanglingTarget,
                        format!("points at {target}, which is not in the store"),
                    )),
                    Some(t) if !schema.can_target(record_type, index, t.record_type()) => {
                        out.push(violation(
                            ViolationKind::TypeMismatch,
                            format!("cannot point at {} record {target}", t.record_type()),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        let empty = slot.map_or(true, FieldSlot::is_empty);
        if empty && schema.is_required(record_type, index) {
            let defaultable = kind == FieldKind::Scalar
                && !layout.is_extensible_index(index)
                && schema.default_text(record_type, index).is_some();
            if !defaultable {
                out.push(violation(
                    ViolationKind::RequiredFieldEmpty,
                    "required field is empty".to_string(),
                ));
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum NameScope {
    Scope(ScopeId),
    /// Records of types without naming scopes only collide with their own type.
    Type(RecordType),
}

/// Each conflict is reported on the later record, paired with the earlier one.
fn name_conflicts(store: &RecordStore) -> Vec<(Handle, Violation)> {
    let schema = store.schema();
    let mut first_seen: HashMap<(NameScope, String), Handle> = HashMap::new();
    let mut reported: BTreeSet<(Handle, Handle)> = BTreeSet::new();
    let mut out = Vec::new();

    for record in store.records() {
        let handle = record.handle();
        let Some(name) = store.name(&handle) else {
            continue;
        };
        let name_field = schema.layout(record.record_type()).and_then(|l| l.name_field);
        let scopes = schema.naming_scopes(record.record_type());
        let keys: Vec<NameScope> = if scopes.is_empty() {
            vec![NameScope::Type(record.record_type().clone())]
        } else {
            scopes.into_iter().map(NameScope::Scope).collect()
        };

        let folded = name.to_lowercase();
        for key in keys {
            match first_seen.entry((key, folded.clone())) {
                Entry::Occupied(entry) => {
                    let earlier = *entry.get();
                    if reported.insert((handle, earlier)) {
                        let scope = match &entry.key().0 {
                            NameScope::Scope(s) => s.clone(),
                            NameScope::Type(t) => t.to_string(),
                        };
                        out.push((
                            earlier,
                            Violation {
                                handle: Some(handle),
                                field_index: name_field,
                                kind: ViolationKind::NameConflict,
                                description: format!("name {name:?} is already used by {earlier} in {scope}"),
                            },
                        ));
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(handle);
                }
            }
        }
    }
    out
}

fn check_store_rules(store: &RecordStore, out: &mut Vec<Violation>) {
    let schema = store.schema();
    for record_type in schema.required_types() {
        if store.num_records_of_type(&record_type) == 0 {
            out.push(Violation {
                handle: None,
                field_index: None,
                kind: ViolationKind::MissingRequiredType,
                description: format!("no {record_type} record"),
            });
        }
    }

    let mut first_of_type: HashMap<&RecordType, Handle> = HashMap::new();
    for record in store.records() {
        if !schema.is_unique(record.record_type()) {
            continue;
        }
        match first_of_type.entry(record.record_type()) {
            Entry::Occupied(entry) => out.push(Violation {
                handle: Some(record.handle()),
                field_index: None,
                kind: ViolationKind::DuplicateUniqueType,
                description: format!("{} is unique but {} already exists", entry.key(), entry.get()),
            }),
            Entry::Vacant(entry) => {
                entry.insert(record.handle());
            }
        }
    }
}
