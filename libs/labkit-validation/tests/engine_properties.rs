#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Behavioural properties of `validate` over realistic intake schemas.

use labkit_validation::{Field, Schema, ValidationOptions, predicates, validate};
use serde_json::{Value, json};

fn intake_schema() -> Schema {
    Schema::new()
        .field("sampleId", Field::uuid().required())
        .field("submitter", Field::string().required().min_length(2).max_length(64))
        .field("phone", Field::phone())
        .field("volumeMl", Field::number().min(0.1).max(500.0))
        .field("replicates", Field::integer().min(1.0).default_value(json!(1)))
        .field("collectedOn", Field::date().required())
        .field("analyzedOn", Field::date())
        .rule(predicates::date_range("collectedOn", "analyzedOn"))
}

#[test]
fn every_violation_is_reported_in_one_pass() {
    let payload = json!({
        "sampleId": "nope",
        "submitter": "x",
        "phone": "123",
        "volumeMl": 900,
        "replicates": 0,
    });

    let result = validate(&intake_schema(), &payload, &ValidationOptions::default());
    let fields: Vec<_> = result
        .errors()
        .expect("invalid")
        .iter()
        .map(|v| v.field.as_str())
        .collect();

    assert_eq!(
        fields,
        ["sampleId", "submitter", "phone", "volumeMl", "replicates", "collectedOn"]
    );
}

#[test]
fn abort_early_reports_exactly_one() {
    let payload = json!({"sampleId": "nope", "submitter": "x"});
    let result = validate(
        &intake_schema(),
        &payload,
        &ValidationOptions::default().abort_early(true),
    );
    assert_eq!(result.errors().expect("invalid").len(), 1);
}

#[test]
fn sanitized_output_only_contains_declared_fields() {
    let payload = json!({
        "sampleId": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        "submitter": "Dr. Chen",
        "collectedOn": "2024-05-01",
        "internalFlag": true,
        "debug": {"trace": 1},
    });

    let result = validate(&intake_schema(), &payload, &ValidationOptions::default());
    let data = result.data().expect("valid").as_object().expect("object");

    let schema = intake_schema();
    let declared: Vec<_> = schema.field_names().collect();
    assert!(data.keys().all(|k| declared.contains(&k.as_str())));
    assert!(!data.contains_key("internalFlag"));
    assert_eq!(data.get("replicates"), Some(&json!(1)));
}

#[test]
fn conversion_produces_declared_types() {
    let payload = json!({
        "sampleId": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        "submitter": "Dr. Chen",
        "collectedOn": "2024-05-01",
        "volumeMl": "12.5",
        "replicates": "3",
    });

    let result = validate(&intake_schema(), &payload, &ValidationOptions::default());
    let data = result.data().expect("valid");
    assert_eq!(data["volumeMl"], json!(12.5));
    assert_eq!(data["replicates"], json!(3));
    assert!(data["replicates"].is_i64());
}

#[test]
fn short_username_fails_min_length() {
    let schema = Schema::new().field("username", Field::string().required().min_length(3));

    let result = validate(&schema, &json!({"username": "ab"}), &ValidationOptions::default());
    assert!(!result.is_valid());
    assert!(result.data().is_none());

    let errors = result.errors().expect("invalid");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "username");
    assert_eq!(errors[0].rule, "min-length");
}

#[test]
fn cross_field_rule_is_skipped_when_a_side_is_missing() {
    let payload = json!({
        "sampleId": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        "submitter": "Dr. Chen",
        "collectedOn": "2024-05-01",
    });
    assert!(validate(&intake_schema(), &payload, &ValidationOptions::default()).is_valid());

    let reversed = json!({
        "sampleId": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        "submitter": "Dr. Chen",
        "collectedOn": "2024-05-03",
        "analyzedOn": "2024-05-01",
    });
    let result = validate(&intake_schema(), &reversed, &ValidationOptions::default());
    let errors = result.errors().expect("invalid");
    assert_eq!(errors[0].rule, "date.range");
    assert_eq!(errors[0].value, Some(Value::from("2024-05-01")));
}

#[test]
fn validation_is_repeatable() {
    let schema = intake_schema();
    let payload = json!({"submitter": 7});
    let first = validate(&schema, &payload, &ValidationOptions::default());
    let second = validate(&schema, &payload, &ValidationOptions::default());
    assert_eq!(first, second);
}
