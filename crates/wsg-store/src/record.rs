//! Records and field slots.

use serde::{Deserialize, Serialize};
use wsg_schema::FieldKind;
use wsg_types::{Handle, RecordType};

/// One field of a record: either text or a handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldSlot {
    Scalar(String),
    /// The null handle means "unset".
    Pointer(Handle),
}

impl FieldSlot {
    /// An unset slot of the given kind.
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Scalar => Self::Scalar(String::new()),
            FieldKind::Pointer => Self::Pointer(Handle::null()),
        }
    }

    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn pointer(target: Handle) -> Self {
        Self::Pointer(target)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Scalar(_) => FieldKind::Scalar,
            Self::Pointer(_) => FieldKind::Pointer,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Pointer(_) => None,
        }
    }

    /// The target of a non-null pointer slot.
    pub fn as_pointer(&self) -> Option<Handle> {
        match self {
            Self::Pointer(h) => h.non_null(),
            Self::Scalar(_) => None,
        }
    }

    /// Returns `true` for empty text and null pointers.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_empty(),
            Self::Pointer(h) => h.is_null(),
        }
    }
}

/// A typed record: a handle, a type key, and an ordered list of field slots.
///
/// Records are owned by exactly one [`crate::RecordStore`]. Only the store's
/// mutation paths can change a record's fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    handle: Handle,
    record_type: RecordType,
    fields: Vec<FieldSlot>,
}

impl Record {
    pub(crate) fn new(handle: Handle, record_type: RecordType, fields: Vec<FieldSlot>) -> Self {
        Self {
            handle,
            record_type,
            fields,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn fields(&self) -> &[FieldSlot] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldSlot> {
        self.fields.get(index)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Non-null pointer slots in field order.
    pub fn forward_pointers(&self) -> impl Iterator<Item = ForwardPointer> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter_map(move |(index, slot)| {
                slot.as_pointer().map(|target| ForwardPointer {
                    source: self.handle,
                    field_index: index,
                    target,
                })
            })
    }

    /// Returns `true` if both records have equal types and equal slots,
    /// ignoring handles.
    pub fn same_content(&self, other: &Record) -> bool {
        self.record_type == other.record_type && self.fields == other.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Vec<FieldSlot> {
        &mut self.fields
    }
}

/// A pointer as seen from its source: `(source, field_index) -> target`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForwardPointer {
    pub source: Handle,
    pub field_index: usize,
    pub target: Handle,
}

/// A pointer as seen from its target: who points here, and through which field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReversePointer {
    pub source: Handle,
    pub field_index: usize,
}
