use wsg_store::StoreError;
use wsg_types::RecordType;

/// Errors from clone operations. All are raised while planning, before the
/// destination store is modified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloneError {
    /// The destination schema cannot host a cloned record's type.
    #[error("destination schema does not know record type {0}")]
    UnknownRecordType(RecordType),

    /// A cloned record would violate the destination's field rules.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result alias for clone operations.
pub type CloneResult<T> = Result<T, CloneError>;
