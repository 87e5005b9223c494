//! The closed set of error shapes the pipeline ever exposes to callers.

use http::StatusCode;
use serde_json::Value;

use crate::catalog::{self, ErrDef, ErrorKind, ResponseCode};
use crate::violation::FieldViolation;

/// Canonical error. The variant fixes status, kind, code and operational flag;
/// only `message` and `details` vary per instance.
///
/// `details` is echoed verbatim to callers and must never carry internal-only data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[must_use]
pub enum TaxonomyError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    Authentication {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    Authorization {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    NotFound {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    Conflict {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    Database {
        message: String,
        details: Option<Value>,
    },
    #[error("{message}")]
    ServiceUnavailable {
        message: String,
        details: Option<Value>,
    },
    /// Generic/unknown fault. Never operational.
    #[error("{message}")]
    Internal {
        message: String,
        details: Option<Value>,
    },
}

impl TaxonomyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Validation failure whose details are the given field violations.
    pub fn invalid_fields(message: impl Into<String>, violations: &[FieldViolation]) -> Self {
        let details = serde_json::to_value(violations).unwrap_or(Value::Null);
        Self::validation(message).with_details(details)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            details: None,
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            details: None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            details: None,
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            details: None,
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            details: None,
        }
    }

    /// Replace the details payload. A `null` payload clears it.
    pub fn with_details(mut self, value: Value) -> Self {
        let slot = match &mut self {
            Self::Validation { details, .. }
            | Self::Authentication { details, .. }
            | Self::Authorization { details, .. }
            | Self::NotFound { details, .. }
            | Self::Conflict { details, .. }
            | Self::Database { details, .. }
            | Self::ServiceUnavailable { details, .. }
            | Self::Internal { details, .. } => details,
        };
        *slot = if value.is_null() { None } else { Some(value) };
        self
    }

    /// Static definition backing this variant.
    #[must_use]
    pub const fn def(&self) -> &'static ErrDef {
        match self {
            Self::Validation { .. } => &catalog::VALIDATION,
            Self::Authentication { .. } => &catalog::AUTHENTICATION,
            Self::Authorization { .. } => &catalog::AUTHORIZATION,
            Self::NotFound { .. } => &catalog::NOT_FOUND,
            Self::Conflict { .. } => &catalog::CONFLICT,
            Self::Database { .. } => &catalog::DATABASE,
            Self::ServiceUnavailable { .. } => &catalog::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => &catalog::INTERNAL,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::Authentication { message, .. }
            | Self::Authorization { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::Database { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Validation { details, .. }
            | Self::Authentication { details, .. }
            | Self::Authorization { details, .. }
            | Self::NotFound { details, .. }
            | Self::Conflict { details, .. }
            | Self::Database { details, .. }
            | Self::ServiceUnavailable { details, .. }
            | Self::Internal { details, .. } => details.as_ref(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.def().status_code()
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.def().kind
    }

    #[must_use]
    pub const fn code(&self) -> ResponseCode {
        self.def().code
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.def().name
    }

    /// `false` flags faults that should alert on process health rather than be retried.
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        self.def().operational
    }

    /// True for failures logged at error severity.
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::violation::Target;
    use serde_json::json;

    #[test]
    fn variants_fix_status_and_kind() {
        let cases = [
            (TaxonomyError::validation("x"), 400, ErrorKind::Validation),
            (TaxonomyError::authentication("x"), 401, ErrorKind::Authentication),
            (TaxonomyError::authorization("x"), 403, ErrorKind::Authorization),
            (TaxonomyError::not_found("x"), 404, ErrorKind::Business),
            (TaxonomyError::conflict("x"), 409, ErrorKind::Business),
            (TaxonomyError::database("x"), 500, ErrorKind::Database),
            (TaxonomyError::service_unavailable("x"), 503, ErrorKind::System),
            (TaxonomyError::internal("x"), 500, ErrorKind::System),
        ];

        for (err, status, kind) in cases {
            assert_eq!(err.status().as_u16(), status, "{}", err.name());
            assert_eq!(err.kind(), kind, "{}", err.name());
        }
    }

    #[test]
    fn details_vary_but_mapping_does_not() {
        let a = TaxonomyError::conflict("first").with_details(json!({"constraint": "a"}));
        let b = TaxonomyError::conflict("second");

        assert_eq!(a.status(), b.status());
        assert_eq!(a.code(), b.code());
        assert_eq!(a.details(), Some(&json!({"constraint": "a"})));
        assert_eq!(b.details(), None);
        assert_eq!(a.to_string(), "first");
    }

    #[test]
    fn null_details_clear_payload() {
        let err = TaxonomyError::validation("bad").with_details(json!([1]));
        let err = err.with_details(Value::Null);
        assert!(err.details().is_none());
    }

    #[test]
    fn invalid_fields_serializes_violations() {
        let violations = vec![FieldViolation {
            field: "username".to_owned(),
            message: "\"username\" length must be at least 3 characters long".to_owned(),
            value: Some(json!("ab")),
            rule: "min-length".to_owned(),
            location: Some(Target::Body),
        }];

        let err = TaxonomyError::invalid_fields("Validation failed", &violations);
        let details = err.details().unwrap();
        assert_eq!(details[0]["field"], "username");
        assert_eq!(details[0]["rule"], "min-length");
        assert_eq!(details[0]["location"], "body");
    }

    #[test]
    fn internal_is_not_operational() {
        assert!(!TaxonomyError::internal("boom").is_operational());
        assert!(TaxonomyError::not_found("nope").is_operational());
        assert!(TaxonomyError::internal("boom").is_server_fault());
        assert!(!TaxonomyError::conflict("dup").is_server_fault());
    }
}
