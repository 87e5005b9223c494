//! Failure shapes collaborators can raise when they have no richer error type
//! of their own. Each one is recognized structurally by a probe.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFaultKind {
    Expired,
    Malformed,
    NotYetValid,
}

impl fmt::Display for TokenFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Expired => "expired",
            Self::Malformed => "malformed",
            Self::NotYetValid => "not yet valid",
        })
    }
}

/// Credential rejected by a token verifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token {kind}")]
pub struct TokenFault {
    pub kind: TokenFaultKind,
}

impl TokenFault {
    #[must_use]
    pub const fn new(kind: TokenFaultKind) -> Self {
        Self { kind }
    }
}

/// Storage failure carrying a backend diagnostic code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RelationalFailure {
    pub code: String,
    pub constraint: Option<String>,
    pub detail: Option<String>,
    pub message: String,
}

impl RelationalFailure {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            constraint: None,
            detail: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFaultKind {
    ConnectionRefused,
    TimedOut,
    HostNotFound,
}

impl fmt::Display for NetworkFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ConnectionRefused => "connection refused",
            Self::TimedOut => "timed out",
            Self::HostNotFound => "host not found",
        })
    }
}

/// Downstream dependency unreachable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct NetworkFailure {
    pub kind: NetworkFaultKind,
    pub message: String,
}

impl NetworkFailure {
    #[must_use]
    pub fn new(kind: NetworkFaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Panic payload captured at the HTTP boundary.
#[derive(Debug, Clone, thiserror::Error)]
#[error("handler panicked: {0}")]
pub struct PanicFault(pub String);
