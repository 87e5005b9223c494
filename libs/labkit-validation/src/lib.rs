//! Declarative request validation for LabKit
//!
//! - `Schema` / `Field`: the schema grammar (field name → type, flags, constraints, predicates)
//! - `predicates`: reusable field-level and cross-field predicates
//! - `validate`: the pure engine that checks and coerces a JSON payload
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod engine;
pub mod error;
pub mod options;
pub mod predicates;
pub mod schema;

pub use engine::{ValidationResult, validate};
pub use error::SchemaError;
pub use options::ValidationOptions;
pub use predicates::{ObjectRule, Predicate, Rejection};
pub use schema::{Constraint, Field, FieldType, Schema};
