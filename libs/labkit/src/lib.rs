//! LabKit: the LabOps HTTP request pipeline
//!
//! - `context`: per-request correlation id
//! - `api`: response envelopes, the handler error channel, the terminal error
//!   handler and the validation middleware
//! - `classify`: maps foreign failures onto the closed taxonomy
//! - `telemetry`: logging bootstrap and the per-request trace span
//! - `stack`: assembles all of the above around an application router
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod classify;
pub mod config;
pub mod context;
pub mod stack;
pub mod telemetry;

// Re-export commonly used types
pub use api::{ApiError, ApiResponse, ApiResult, Responder};
pub use classify::{Classifier, Exposure};
pub use config::{DatabaseBackend, Environment, PipelineConfig, PipelineConfigError};
pub use context::RequestId;
pub use stack::{Pipeline, route_not_found};

pub use labkit_errors as errors;
pub use labkit_validation as validation;
