use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid handle string: {0}")]
    InvalidHandle(String),

    #[error("invalid record type key: {0:?}")]
    InvalidRecordType(String),
}
