//! Sample intake routes.
//!
//! Every route binds its request sections to a schema; handlers only ever see
//! sanitized data and report failures through `ApiResult`.

pub mod registry;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use chrono::Utc;
use labkit::api::prelude::*;
use labkit::validation::predicates::date_range;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

pub use registry::{Sample, SampleRegistry};

const PRIORITIES: [&str; 3] = ["routine", "urgent", "stat"];
const ROLES: [&str; 2] = ["technician", "supervisor"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Intake {
    barcode: String,
    submitter: String,
    contact_phone: Option<String>,
    volume_ml: f64,
    replicates: u32,
    priority: String,
    collected_on: String,
    analyzed_on: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabPath {
    lab_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct SamplePath {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page: u64,
    page_size: u64,
    priority: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Window {
    collected_on: String,
    analyzed_on: String,
}

#[derive(Debug, Deserialize)]
struct RoleHeaders {
    #[serde(rename = "x-lab-role")]
    role: String,
}

fn intake_schema() -> Result<Schema, regex::Error> {
    Ok(Schema::new()
        .field(
            "barcode",
            Field::string()
                .pattern(Regex::new(r"^LAB-\d{4,}$")?)
                .required(),
        )
        .field(
            "submitter",
            Field::string().min_length(2).max_length(64).required(),
        )
        .field("contactPhone", Field::phone())
        .field("volumeMl", Field::number().min(0.1).max(500.0).required())
        .field(
            "replicates",
            Field::integer().min(1.0).max(10.0).default_value(json!(1)),
        )
        .field(
            "priority",
            Field::string().one_of(PRIORITIES).default_value(json!("routine")),
        )
        .field("collectedOn", Field::date().required())
        .field("analyzedOn", Field::date())
        .rule(date_range("collectedOn", "analyzedOn")))
}

fn window_schema() -> Schema {
    Schema::new()
        .field("collectedOn", Field::date().required())
        .field("analyzedOn", Field::date().required())
        .rule(date_range("collectedOn", "analyzedOn"))
}

fn list_schema() -> Schema {
    Schema::new()
        .field("page", Field::integer().min(1.0).default_value(json!(1)))
        .field(
            "pageSize",
            Field::integer().min(1.0).max(100.0).default_value(json!(20)),
        )
        .field("priority", Field::string().one_of(PRIORITIES))
}

fn id_schema(name: &str) -> Schema {
    Schema::new().field(name, Field::uuid().required())
}

fn role_schema() -> Schema {
    Schema::new().field("x-lab-role", Field::string().one_of(ROLES).required())
}

/// Sample intake routes bound to `registry`.
///
/// # Errors
/// Returns an error when a schema pattern does not compile.
pub fn router(registry: SampleRegistry, options: ValidationOptions) -> Result<Router, regex::Error> {
    let guard = |layer: ValidationLayer| Arc::new(layer.options(options));

    let create_layer = guard(
        ValidationLayer::new()
            .params(id_schema("lab_id"))
            .body(intake_schema()?),
    );
    let list_layer = guard(ValidationLayer::single(Target::Query, list_schema()));
    let get_layer = guard(ValidationLayer::single(Target::Params, id_schema("id")));
    let window_layer = guard(
        ValidationLayer::new()
            .params(id_schema("id"))
            .headers(role_schema())
            .body(window_schema()),
    );

    Ok(Router::new()
        .route(
            "/labs/{lab_id}/samples",
            post(register_sample).route_layer(from_fn_with_state(create_layer, validate_request)),
        )
        .route(
            "/samples",
            get(list_samples).route_layer(from_fn_with_state(list_layer, validate_request)),
        )
        .route(
            "/samples/{id}",
            get(get_sample).route_layer(from_fn_with_state(get_layer, validate_request)),
        )
        .route(
            "/samples/{id}/window",
            patch(update_window).route_layer(from_fn_with_state(window_layer, validate_request)),
        )
        .with_state(registry))
}

async fn register_sample(
    State(registry): State<SampleRegistry>,
    responder: Responder,
    ValidParams(path): ValidParams<LabPath>,
    ValidBody(intake): ValidBody<Intake>,
) -> ApiResult {
    let sample = Sample {
        id: Uuid::now_v7(),
        lab_id: path.lab_id,
        barcode: intake.barcode,
        submitter: intake.submitter,
        contact_phone: intake.contact_phone,
        volume_ml: intake.volume_ml,
        replicates: intake.replicates,
        priority: intake.priority,
        collected_on: intake.collected_on,
        analyzed_on: intake.analyzed_on,
        registered_at: Utc::now(),
    };

    let stored = settle(async move { registry.insert(sample) }).await?;
    tracing::info!(sample_id = %stored.id, barcode = %stored.barcode, "sample registered");
    Ok(responder.created(stored, "Sample registered"))
}

async fn list_samples(
    State(registry): State<SampleRegistry>,
    responder: Responder,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> ApiResult {
    let (items, total) = registry.page(query.priority.as_deref(), query.page, query.page_size);
    Ok(responder.paginated(
        items,
        PaginationMeta::new(query.page, query.page_size, total),
        "Samples retrieved",
    ))
}

async fn get_sample(
    State(registry): State<SampleRegistry>,
    responder: Responder,
    ValidParams(path): ValidParams<SamplePath>,
) -> ApiResult {
    let sample = registry
        .get(path.id)
        .ok_or_else(|| TaxonomyError::not_found(format!("Sample {} not found", path.id)))?;
    Ok(responder.success(sample, "Sample retrieved"))
}

async fn update_window(
    State(registry): State<SampleRegistry>,
    responder: Responder,
    ValidParams(path): ValidParams<SamplePath>,
    ValidHeaders(headers): ValidHeaders<RoleHeaders>,
    ValidBody(window): ValidBody<Window>,
) -> ApiResult {
    if headers.role != "supervisor" {
        return Err(
            TaxonomyError::authorization("Changing the analysis window requires the supervisor role")
                .into(),
        );
    }
    let updated = registry
        .update(path.id, |s| {
            s.collected_on = window.collected_on;
            s.analyzed_on = Some(window.analyzed_on);
        })
        .ok_or_else(|| TaxonomyError::not_found(format!("Sample {} not found", path.id)))?;
    Ok(responder.success(updated, "Analysis window updated"))
}
