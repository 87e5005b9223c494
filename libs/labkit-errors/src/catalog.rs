//! Fixed variant table: status, kind and code per taxonomy variant

use http::StatusCode;
use serde::{Deserialize, Serialize};

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

/// Category of a failure, used by callers to decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or missing input
    Validation,
    /// Missing or invalid credential
    Authentication,
    /// Insufficient rights
    Authorization,
    /// Domain-rule violation (not found, conflict)
    Business,
    /// Storage-layer failure
    Database,
    /// Unclassified, network or dependency failure
    System,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Authentication => "AUTHENTICATION",
            Self::Authorization => "AUTHORIZATION",
            Self::Business => "BUSINESS",
            Self::Database => "DATABASE",
            Self::System => "SYSTEM",
        }
    }
}

/// Machine-readable response code carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    Ok,
    Created,
    ValidationError,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    DatabaseError,
    ServiceUnavailable,
    InternalError,
}

impl ResponseCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "CREATED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static definition of one taxonomy variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrDef {
    pub name: &'static str,
    pub status: u16,
    pub kind: ErrorKind,
    pub code: ResponseCode,
    pub operational: bool,
}

impl ErrDef {
    /// HTTP status for this definition, `500` if the table holds an invalid code.
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub const VALIDATION: ErrDef = ErrDef {
    name: "ValidationError",
    status: 400,
    kind: ErrorKind::Validation,
    code: ResponseCode::ValidationError,
    operational: true,
};

pub const AUTHENTICATION: ErrDef = ErrDef {
    name: "AuthenticationError",
    status: 401,
    kind: ErrorKind::Authentication,
    code: ResponseCode::Unauthorized,
    operational: true,
};

pub const AUTHORIZATION: ErrDef = ErrDef {
    name: "AuthorizationError",
    status: 403,
    kind: ErrorKind::Authorization,
    code: ResponseCode::Forbidden,
    operational: true,
};

pub const NOT_FOUND: ErrDef = ErrDef {
    name: "NotFoundError",
    status: 404,
    kind: ErrorKind::Business,
    code: ResponseCode::NotFound,
    operational: true,
};

pub const CONFLICT: ErrDef = ErrDef {
    name: "ConflictError",
    status: 409,
    kind: ErrorKind::Business,
    code: ResponseCode::Conflict,
    operational: true,
};

pub const DATABASE: ErrDef = ErrDef {
    name: "DatabaseError",
    status: 500,
    kind: ErrorKind::Database,
    code: ResponseCode::DatabaseError,
    operational: true,
};

pub const SERVICE_UNAVAILABLE: ErrDef = ErrDef {
    name: "ServiceUnavailableError",
    status: 503,
    kind: ErrorKind::System,
    code: ResponseCode::ServiceUnavailable,
    operational: true,
};

pub const INTERNAL: ErrDef = ErrDef {
    name: "InternalError",
    status: 500,
    kind: ErrorKind::System,
    code: ResponseCode::InternalError,
    operational: false,
};

/// Every status the taxonomy can ever produce.
pub const ALLOWED_STATUSES: [u16; 7] = [400, 401, 403, 404, 409, 500, 503];
