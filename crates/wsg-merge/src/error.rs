use wsg_clone::CloneError;
use wsg_store::StoreError;
use wsg_types::Handle;

/// Errors from merge operations. All are raised before the destination is
/// modified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// The mapping pairs handles that cannot be treated as the same record.
    #[error("invalid mapping {dest} -> {src}: {reason}")]
    InvalidMapping {
        dest: Handle,
        src: Handle,
        reason: String,
    },

    /// A new record could not be planned into the destination.
    #[error("clone error: {0}")]
    Clone(#[from] CloneError),

    /// A matched record's source fields break the destination's rules.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
