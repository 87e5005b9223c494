use labkit_errors::FieldViolation;

/// Failure raised when a collaborator validates a payload ad hoc through `Schema::check`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("schema validation failed with {} violation(s)", .violations.len())]
pub struct SchemaError {
    pub violations: Vec<FieldViolation>,
}

impl SchemaError {
    #[must_use]
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    /// Message of the first violation, used as the summary line.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.violations.first().map(|v| v.message.as_str())
    }
}
