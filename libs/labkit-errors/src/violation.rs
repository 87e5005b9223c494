//! Field-level validation records shared by the validation engine and the error pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

/// Request section a schema can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Body,
    Query,
    Params,
    Headers,
}

impl Target {
    pub const ALL: [Self; 4] = [Self::Body, Self::Query, Self::Params, Self::Headers];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Query => "query",
            Self::Params => "params",
            Self::Headers => "headers",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual violation for a specific field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct FieldViolation {
    /// field path, e.g. "email" or "items.0.code"
    pub field: String,
    /// Human-readable message describing the violation
    pub message: String,
    /// Offending input value, omitted for absent or sensitive fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Violated rule tag, e.g. "required", "min-length", "date.range"
    pub rule: String,
    /// Request section the field belongs to, set by the HTTP layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Target>,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
            rule: rule.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn at(mut self, target: Target) -> Self {
        self.location = Some(target);
        self
    }
}
