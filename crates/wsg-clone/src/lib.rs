//! Clone engine for the workspace graph.
//!
//! Copies a set of records (optionally with everything they transitively
//! point to) into a destination store under freshly minted handles, and
//! rewrites pointers so the copy references itself rather than the original.
//!
//! # Pointer resolution
//!
//! For each pointer in a cloned record, the target is resolved in order:
//!
//! 1. a record cloned in the same call: the pointer follows the copy;
//! 2. a handle that already exists in the destination: kept verbatim;
//! 3. anything else: the pointer is cleared.
//!
//! A clone is planned in full (handles, resolved fields, schema checks)
//! before the destination is touched, and all creates run inside one
//! [`wsg_store::RecordStore::batch`].

pub mod engine;
pub mod error;
pub mod plan;

pub use engine::{clone_records, clone_records_with, clone_store, duplicate, CloneOptions};
pub use error::{CloneError, CloneResult};
pub use plan::{closure, ClonePlan, PlannedRecord};
