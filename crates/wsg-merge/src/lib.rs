//! Merge engine for the workspace graph.
//!
//! [`merge`] reconciles a destination store with a source store under a
//! handle mapping (`dest handle -> src handle`):
//!
//! - **matched** destination records (mapping keys) keep their handle and
//!   take the source record's fields, with pointers re-resolved;
//! - **unmatched** destination records are removed;
//! - **new** source records (not mapping values) are cloned in under fresh
//!   handles.
//!
//! An empty mapping therefore replaces the destination's content wholesale.
//! A merge is planned completely, mapping checks included, before the
//! destination is modified.
//!
//! [`suggest_mapping`] infers a mapping when the caller has none.

pub mod engine;
pub mod error;
pub mod report;
pub mod suggest;

pub use engine::merge;
pub use error::{MergeError, MergeResult};
pub use report::MergeReport;
pub use suggest::suggest_mapping;
