//! Canonical error taxonomy for the LabOps request pipeline
//!
//! This crate provides pure data types for error handling, with no dependencies
//! on HTTP frameworks. It includes:
//! - the closed error taxonomy (`TaxonomyError`) and its fixed variant table (`ErrDef`)
//! - wire-level codes and kinds (`ResponseCode`, `ErrorKind`)
//! - field-level validation records (`FieldViolation`, `Target`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod taxonomy;
pub mod violation;

// Re-export commonly used types
pub use catalog::{ErrDef, ErrorKind, ResponseCode};
pub use taxonomy::TaxonomyError;
pub use violation::{FieldViolation, Target};

/// Fixed message used for unknown faults when internal messages must not leave the process.
pub const OPAQUE_INTERNAL_MESSAGE: &str = "An unexpected error occurred";
