//! Schema oracle for the workspace graph.
//!
//! The record store never hard-codes record layouts. Every question about a
//! record type (how many fields, which are pointers, where a pointer may
//! point, what the default text is) goes through the [`SchemaOracle`] trait.
//!
//! # Implementations
//!
//! - [`TableSchema`] -- lookup table built in code or loaded from a TOML
//!   [`SchemaFile`]
//!
//! # Pointer targets
//!
//! Pointer fields name the *naming scopes* they accept (`object_lists`);
//! record types declare the scopes they belong to (`references`). A pointer
//! field may target any record type whose scopes intersect the field's
//! accepted scopes. The same scopes decide which names may collide.

pub mod error;
pub mod file;
pub mod oracle;
pub mod table;

pub use error::{SchemaError, SchemaResult};
pub use file::SchemaFile;
pub use oracle::{FieldKind, RecordLayout, SchemaOracle, ScopeId};
pub use table::{FieldSpec, RecordTypeSpec, TableSchema};
