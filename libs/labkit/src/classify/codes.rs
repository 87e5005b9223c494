//! Relational diagnostic code tables, one per storage backend.

use std::fmt;

/// Constraint family a backend diagnostic code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintClass {
    Unique,
    ForeignKey,
    NotNull,
    /// Table or column does not exist
    MissingRelation,
}

/// Maps backend-specific diagnostic codes onto `ConstraintClass`.
pub trait ConstraintCodes: Send + Sync + fmt::Debug {
    fn backend(&self) -> &'static str;

    /// `None` for codes this table does not recognize.
    fn class(&self, code: &str) -> Option<ConstraintClass>;
}

/// SQLSTATE codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresCodes;

impl ConstraintCodes for PostgresCodes {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn class(&self, code: &str) -> Option<ConstraintClass> {
        match code {
            "23505" => Some(ConstraintClass::Unique),
            "23503" => Some(ConstraintClass::ForeignKey),
            "23502" => Some(ConstraintClass::NotNull),
            "42P01" | "42703" => Some(ConstraintClass::MissingRelation),
            _ => None,
        }
    }
}

/// MySQL server error numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlCodes;

impl ConstraintCodes for MySqlCodes {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    fn class(&self, code: &str) -> Option<ConstraintClass> {
        match code {
            "1062" => Some(ConstraintClass::Unique),
            "1451" | "1452" => Some(ConstraintClass::ForeignKey),
            "1048" => Some(ConstraintClass::NotNull),
            "1146" | "1054" => Some(ConstraintClass::MissingRelation),
            _ => None,
        }
    }
}

/// SQLite extended result codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCodes;

impl ConstraintCodes for SqliteCodes {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn class(&self, code: &str) -> Option<ConstraintClass> {
        match code {
            "2067" | "1555" => Some(ConstraintClass::Unique),
            "787" => Some(ConstraintClass::ForeignKey),
            "1299" => Some(ConstraintClass::NotNull),
            _ => None,
        }
    }
}
