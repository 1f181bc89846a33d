use std::fmt;

use serde::{Deserialize, Serialize};
use wsg_types::Handle;

use crate::options::StrictnessLevel;

/// Result of a validity pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityReport {
    pub strictness: StrictnessLevel,
    pub record_count: usize,
    pub violations: Vec<Violation>,
}

impl ValidityReport {
    /// Returns `true` if no violations were found.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations of one kind.
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    /// Violations attached to one record.
    pub fn for_handle(&self, handle: Handle) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(move |v| v.handle == Some(handle))
    }
}

/// One schema violation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Offending record; `None` for store-wide violations.
    pub handle: Option<Handle>,
    pub field_index: Option<usize>,
    pub kind: ViolationKind,
    pub description: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.handle, self.field_index) {
            (Some(h), Some(i)) => write!(f, "[{}] {h} field {i}: {}", self.kind, self.description),
            (Some(h), None) => write!(f, "[{}] {h}: {}", self.kind, self.description),
            _ => write!(f, "[{}] {}", self.kind, self.description),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Pointer target's type is not accepted by the field.
    TypeMismatch,
    /// Pointer target is not in the store.
    DanglingTarget,
    /// Required field is empty and has no schema default.
    RequiredFieldEmpty,
    /// Slot variant disagrees with the schema's field kind.
    WrongFieldKind,
    /// Slot index is outside the type's layout.
    FieldOutOfRange,
    /// Record type is not known to the schema.
    UnknownType,
    /// Two records share a name within a naming scope.
    NameConflict,
    /// A required record type has no records.
    MissingRequiredType,
    /// A unique record type has more than one record.
    DuplicateUniqueType,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TypeMismatch => "type-mismatch",
            Self::DanglingTarget => "dangling-target",
            Self::RequiredFieldEmpty => "required-field-empty",
            Self::WrongFieldKind => "wrong-field-kind",
            Self::FieldOutOfRange => "field-out-of-range",
            Self::UnknownType => "unknown-type",
            Self::NameConflict => "name-conflict",
            Self::MissingRequiredType => "missing-required-type",
            Self::DuplicateUniqueType => "duplicate-unique-type",
        };
        f.write_str(s)
    }
}
