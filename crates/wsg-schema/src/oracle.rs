use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use wsg_types::RecordType;

/// Identifier of a naming scope (a "reference list" in schema terms).
pub type ScopeId = String;

/// What a field slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text.
    Scalar,
    /// A handle to another record in the same store (or null).
    Pointer,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Pointer => write!(f, "pointer"),
        }
    }
}

/// Field layout of a record type.
///
/// Indices `0..fixed_fields` form the fixed region and never move. If
/// `extensible_group` is set, indices from `fixed_fields` onward repeat a group
/// of that many fields, up to `max_fields` when bounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLayout {
    pub fixed_fields: usize,
    pub extensible_group: Option<usize>,
    /// Number of slots a freshly created record starts with.
    pub min_fields: usize,
    pub max_fields: Option<usize>,
    /// Index of the identifying name field, if the type has one.
    pub name_field: Option<usize>,
}

impl RecordLayout {
    /// Returns `true` if `index` falls in the extensible region.
    pub fn is_extensible_index(&self, index: usize) -> bool {
        self.extensible_group.is_some() && index >= self.fixed_fields
    }

    /// Returns `true` if a record of this type may have a slot at `index`.
    pub fn is_legal_index(&self, index: usize) -> bool {
        if let Some(max) = self.max_fields {
            if index >= max {
                return false;
            }
        }
        index < self.fixed_fields || self.extensible_group.is_some()
    }

    /// Position of `index` inside its extensible group, if it has one.
    pub fn group_offset(&self, index: usize) -> Option<usize> {
        let group = self.extensible_group?;
        if index < self.fixed_fields || group == 0 {
            return None;
        }
        Some((index - self.fixed_fields) % group)
    }
}

/// Read-only queries against static schema metadata.
///
/// Implementations must be pure: the same question always gets the same
/// answer, and answering never mutates anything. The record store holds an
/// `Arc<dyn SchemaOracle>` and consults it on every mutation.
pub trait SchemaOracle: Send + Sync {
    /// Field layout of `record_type`, or `None` if the type is unknown.
    fn layout(&self, record_type: &RecordType) -> Option<RecordLayout>;

    /// Kind of the field at `index`, or `None` if `index` is not a legal
    /// field index for the type (or the type is unknown).
    fn field_kind(&self, record_type: &RecordType, index: usize) -> Option<FieldKind>;

    /// Record types a pointer field may target. Empty for scalar fields.
    fn legal_target_types(&self, record_type: &RecordType, index: usize) -> BTreeSet<RecordType>;

    /// Whether the field must be non-empty for the record to be valid.
    fn is_required(&self, record_type: &RecordType, index: usize) -> bool;

    /// Schema default text for the field, if any.
    fn default_text(&self, record_type: &RecordType, index: usize) -> Option<String>;

    /// Naming scopes the type's records belong to.
    fn naming_scopes(&self, record_type: &RecordType) -> BTreeSet<ScopeId>;

    /// Whether at most one record of the type may exist in a valid store.
    fn is_unique(&self, _record_type: &RecordType) -> bool {
        false
    }

    /// Record types that must be present at least once in a valid store.
    fn required_types(&self) -> Vec<RecordType> {
        Vec::new()
    }

    /// Returns `true` if the type is known to the schema.
    fn is_known(&self, record_type: &RecordType) -> bool {
        self.layout(record_type).is_some()
    }

    /// Returns `true` if a pointer at (`record_type`, `index`) may target a
    /// record of `target_type`.
    fn can_target(&self, record_type: &RecordType, index: usize, target_type: &RecordType) -> bool {
        self.legal_target_types(record_type, index).contains(target_type)
    }
}
