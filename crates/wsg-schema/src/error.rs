use std::path::PathBuf;

/// Errors from building or loading a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Two record type specs share a key.
    #[error("duplicate record type: {0}")]
    DuplicateType(String),

    /// A record type key is empty or otherwise malformed.
    #[error("invalid record type: {0}")]
    InvalidType(#[from] wsg_types::TypeError),

    /// A record type spec is internally inconsistent.
    #[error("invalid layout for {record_type}: {reason}")]
    InvalidLayout { record_type: String, reason: String },

    /// The schema file could not be read.
    #[error("cannot read schema file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The schema file is not valid TOML for a [`crate::SchemaFile`].
    #[error("cannot parse schema file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
