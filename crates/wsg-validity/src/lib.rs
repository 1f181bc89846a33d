//! Validity checking for the workspace graph.
//!
//! [`validate`] walks a [`wsg_store::RecordStore`] and reports every schema
//! violation it finds. It never mutates the store: records are allowed to be
//! invalid while they are being edited, and only export paths are expected
//! to reject an invalid graph.

pub mod checker;
pub mod options;
pub mod report;

pub use checker::{validate, validate_record};
pub use options::{StrictnessLevel, ValidityOptions};
pub use report::{ValidityReport, Violation, ViolationKind};
