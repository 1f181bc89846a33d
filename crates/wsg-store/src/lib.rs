//! In-memory record store for the workspace graph.
//!
//! A [`RecordStore`] owns typed records keyed by [`wsg_types::Handle`]. Each
//! record is an ordered list of [`FieldSlot`]s; pointer slots hold handles of
//! other records in the same store. The store keeps a reverse pointer index
//! so "who points at this record" is a single lookup.
//!
//! # Guarantees
//!
//! After every public call returns:
//!
//! 1. Every non-null pointer targets a record present in this store.
//! 2. Every pointer has exactly one reverse index entry, and every reverse
//!    entry has its pointer.
//!
//! Mutators validate before they touch state. A rejected call returns an
//! [`StoreError`] and leaves the store as it was.
//!
//! # Change events
//!
//! Committed changes are reported as [`StoreEvent`]s, once per public call
//! (or once per [`RecordStore::batch`]). Consumers poll with
//! [`RecordStore::drain_events`] or subscribe to a broadcast channel with
//! [`RecordStore::subscribe`].

pub mod config;
pub mod error;
pub mod events;
pub(crate) mod index;
pub mod mutation;
pub mod naming;
pub mod record;
pub mod removal;
pub mod snapshot;
pub mod store;
pub mod swap;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use events::{EventFilter, EventKind, EventStream, StoreEvent};
pub use record::{FieldSlot, ForwardPointer, Record, ReversePointer};
pub use removal::Removed;
pub use snapshot::StoreSnapshot;
pub use store::RecordStore;
