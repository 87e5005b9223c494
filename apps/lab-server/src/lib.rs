//! LabOps sample intake server.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod samples;
pub mod signals;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use labkit::api::prelude::*;
use labkit::{Pipeline, route_not_found};

use crate::config::AppConfig;
use crate::samples::SampleRegistry;

async fn healthz(responder: Responder) -> ApiResponse {
    responder.success(serde_json::json!({"status": "ok"}), "Service healthy")
}

/// Build the application router wrapped in the request pipeline.
///
/// # Errors
/// Returns an error when a schema or a configured header name is invalid.
pub fn build_router(config: &AppConfig, registry: SampleRegistry) -> Result<Router> {
    let samples = samples::router(registry, config.pipeline.validation)
        .context("failed to compile sample schemas")?;

    let router = Router::new()
        .route("/healthz", get(healthz))
        .merge(samples)
        .fallback(route_not_found);

    Pipeline::new(config.pipeline.clone())
        .body_limit(config.server.body_limit_bytes)
        .timeout(config.request_timeout())
        .apply(router)
        .context("failed to assemble request pipeline")
}
