use wsg_schema::FieldKind;
use wsg_types::{Handle, RecordType};

/// Errors from record store operations.
///
/// Every mutator validates before it touches state, so an `Err` always means
/// the store is exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The record does not exist in this store.
    #[error("record not found: {0}")]
    NotFound(Handle),

    /// The field index is beyond the record's current or legal range.
    #[error("field index {index} out of range for {handle} ({field_count} fields)")]
    IndexOutOfRange {
        handle: Handle,
        index: usize,
        field_count: usize,
    },

    /// The pointer target's record type is not accepted by the field.
    #[error("{handle} field {index} cannot point at {target} of type {target_type}")]
    TypeMismatch {
        handle: Handle,
        index: usize,
        target: Handle,
        target_type: RecordType,
    },

    /// The pointer target is not present in this store.
    #[error("{handle} field {index} cannot point at {target}: not in this store")]
    DanglingTarget {
        handle: Handle,
        index: usize,
        target: Handle,
    },

    /// A scalar was written into a pointer field or vice versa.
    #[error("{handle} field {index} is a {expected} field")]
    WrongFieldKind {
        handle: Handle,
        index: usize,
        expected: FieldKind,
    },

    /// The schema does not know the record type.
    #[error("unknown record type: {0}")]
    UnknownRecordType(RecordType),

    /// A record with this handle already exists.
    #[error("duplicate handle: {0}")]
    DuplicateHandle(Handle),

    /// The null handle cannot identify a record.
    #[error("the null handle cannot identify a record")]
    NullHandle,

    /// The record has no extensible group to pop.
    #[error("record {0} has no extensible fields to pop")]
    NotExtensible(Handle),

    /// A replacement record's type shares no naming scope with the record
    /// it would replace.
    #[error("{handle} cannot be replaced by a {record_type} record: no shared naming scope")]
    IncompatibleReplacement { handle: Handle, record_type: RecordType },

    /// The record type has no identifying name field.
    #[error("record type {0} has no name field")]
    NoNameField(RecordType),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
