//! Classification of foreign failures, end to end through the public API.

use std::io;

use anyhow::Context;
use http::StatusCode;
use labkit::classify::{
    Classifier, Exposure, MySqlCodes, NetworkFailure, NetworkFaultKind, PostgresCodes,
    RelationalFailure, TokenFault, TokenFaultKind,
};
use labkit::errors::{ErrorKind, OPAQUE_INTERNAL_MESSAGE, ResponseCode, TaxonomyError};
use labkit::validation::{Field, Schema};

const TABLE_STATUSES: [u16; 7] = [400, 401, 403, 404, 409, 500, 503];

fn development() -> Classifier {
    Classifier::new(PostgresCodes, Exposure::VERBOSE)
}

fn production() -> Classifier {
    Classifier::new(PostgresCodes, Exposure::OPAQUE)
}

#[derive(Debug, thiserror::Error)]
#[error("reagent cache exploded: shard 7 at 10.0.3.14")]
struct UnknownFault;

#[test]
fn scenario_a_unique_violation_is_conflict() {
    let err = RelationalFailure::new(
        "23505",
        "duplicate key value violates unique constraint \"samples_barcode_key\"",
    )
    .with_constraint("samples_barcode_key")
    .with_detail("Key (barcode)=(LAB-0001) already exists.");

    let classified = production().classify(&err);
    assert_eq!(classified.status(), StatusCode::CONFLICT);
    assert_eq!(classified.code(), ResponseCode::Conflict);
    assert_eq!(classified.kind(), ErrorKind::Business);
    assert_eq!(classified.details().unwrap()["constraint"], "samples_barcode_key");
}

#[test]
fn scenario_b_min_length_is_validation_error() {
    let schema = Schema::new().field("username", Field::string().min_length(3).required());
    let err = schema.check(&serde_json::json!({"username": "ab"})).unwrap_err();

    let classified = production().classify(&err);
    assert_eq!(classified.status(), StatusCode::BAD_REQUEST);
    assert_eq!(classified.code(), ResponseCode::ValidationError);

    let details = classified.details().unwrap().as_array().unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0]["field"], "username");
    assert_eq!(details[0]["rule"], "min-length");
}

#[test]
fn scenario_c_expired_token_is_distinguished_from_malformed() {
    use jsonwebtoken::errors::{Error, ErrorKind as JwtKind};

    let expired = production().classify(&Error::from(JwtKind::ExpiredSignature));
    let malformed = production().classify(&Error::from(JwtKind::InvalidToken));

    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);
    assert!(expired.message().contains("expired"));
    assert!(!malformed.message().contains("expired"));

    let local = production().classify(&TokenFault::new(TokenFaultKind::Expired));
    assert_eq!(local.message(), expired.message());
}

#[test]
fn scenario_d_connection_refused_is_service_unavailable() {
    let io_err = io::Error::from(io::ErrorKind::ConnectionRefused);
    let classified = production().classify(&io_err);
    assert_eq!(classified.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(classified.code(), ResponseCode::ServiceUnavailable);

    let explicit = NetworkFailure::new(NetworkFaultKind::ConnectionRefused, "inventory service down");
    assert_eq!(production().classify(&explicit), classified);
}

#[test]
fn scenario_e_unknown_fault_is_redacted_outside_development() {
    let prod = production().classify(&UnknownFault);
    assert_eq!(prod.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!prod.is_operational());
    assert_eq!(prod.message(), OPAQUE_INTERNAL_MESSAGE);

    let dev = development().classify(&UnknownFault);
    assert!(dev.message().contains("shard 7"));
    assert!(!dev.is_operational());
}

#[test]
fn classification_is_idempotent() {
    let inputs: Vec<Box<dyn std::error::Error + Send + Sync>> = vec![
        Box::new(RelationalFailure::new("23503", "fk violation")),
        Box::new(io::Error::from(io::ErrorKind::TimedOut)),
        Box::new(TokenFault::new(TokenFaultKind::Malformed)),
        Box::new(UnknownFault),
        Box::new(TaxonomyError::not_found("Sample not found")),
    ];

    for c in [development(), production()] {
        for input in &inputs {
            let once = c.classify(input.as_ref());
            let twice = c.classify(&once);
            assert_eq!(once, twice);
        }
    }
}

#[test]
fn statuses_always_come_from_the_fixed_table() {
    let inputs: Vec<Box<dyn std::error::Error + Send + Sync>> = vec![
        Box::new(RelationalFailure::new("23505", "dup")),
        Box::new(RelationalFailure::new("23502", "null")),
        Box::new(RelationalFailure::new("42P01", "missing relation")),
        Box::new(RelationalFailure::new("99999", "unknown")),
        Box::new(io::Error::other("opaque io")),
        Box::new(io::Error::from(io::ErrorKind::ConnectionRefused)),
        Box::new(TokenFault::new(TokenFaultKind::NotYetValid)),
        Box::new(UnknownFault),
    ];

    for input in &inputs {
        let status = production().classify(input.as_ref()).status().as_u16();
        assert!(TABLE_STATUSES.contains(&status), "unexpected status {status}");
    }
}

#[test]
fn context_chains_are_walked() {
    let err = Err::<(), _>(RelationalFailure::new("1062", "Duplicate entry 'LAB-1'"))
        .context("registering sample LAB-1")
        .unwrap_err();

    let mysql = Classifier::new(MySqlCodes, Exposure::OPAQUE);
    let classified = mysql.classify(&*err);
    assert_eq!(classified.status(), StatusCode::CONFLICT);
}

#[test]
fn json_failures_inside_handlers_are_internal() {
    let parse = serde_json::from_str::<serde_json::Value>("{\"barcode\": ").unwrap_err();
    let classified = production().classify(&parse);
    assert_eq!(classified.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(classified.message(), OPAQUE_INTERNAL_MESSAGE);

    let keys = std::collections::HashMap::from([(vec![7u8], 1u8)]);
    let serialize = serde_json::to_string(&keys).unwrap_err();
    let classified = production().classify(&serialize);
    assert!(matches!(classified, TaxonomyError::Internal { .. }));
    assert_eq!(classified.kind(), ErrorKind::System);
    assert_eq!(classified.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(classified.message(), OPAQUE_INTERNAL_MESSAGE);
    assert!(classified.details().is_none());
}
