//! Foundation types for the workspace graph (WSG).
//!
//! This crate provides the identity and key types shared by every other WSG
//! crate. It has no knowledge of records, fields, or schemas.
//!
//! # Key Types
//!
//! - [`Handle`] — Stable 128-bit record identifier (UUID v7), with a null sentinel
//! - [`RecordType`] — Opaque schema key naming a record's type
//! - [`HandleMap`] — Ordered old→new handle correspondence returned by clone and merge

pub mod error;
pub mod handle;
pub mod record_type;

pub use error::TypeError;
pub use handle::{Handle, HandleMap};
pub use record_type::RecordType;
