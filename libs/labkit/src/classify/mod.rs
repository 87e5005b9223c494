//! Error classifier: maps any failure onto the closed taxonomy.
//!
//! Classification is two-staged. Probes (`probes`) walk the source chain and
//! extract structural `Facts`; the ordered `RULES` table then picks the first
//! rule whose predicate holds and builds the taxonomy error from the facts.
//! Earlier rules are more specific and always win.

pub mod codes;
pub mod faults;
pub mod probes;

use std::error::Error;
use std::sync::Arc;

use labkit_errors::{OPAQUE_INTERNAL_MESSAGE, TaxonomyError};
use serde_json::json;

use crate::config::{Environment, PipelineConfig};

pub use codes::{ConstraintClass, ConstraintCodes, MySqlCodes, PostgresCodes, SqliteCodes};
pub use faults::{
    NetworkFailure, NetworkFaultKind, PanicFault, RelationalFailure, TokenFault, TokenFaultKind,
};
pub use probes::{Facts, RelationalFacts};

const OPAQUE_DATABASE_MESSAGE: &str = "Database operation failed";

/// What the classifier may reveal from foreign failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exposure {
    /// Use the original message for unclassified faults and unknown database codes
    pub internal_messages: bool,
}

impl Exposure {
    pub const OPAQUE: Self = Self {
        internal_messages: false,
    };
    pub const VERBOSE: Self = Self {
        internal_messages: true,
    };

    #[must_use]
    pub const fn for_environment(env: Environment) -> Self {
        if env.is_development() {
            Self::VERBOSE
        } else {
            Self::OPAQUE
        }
    }
}

/// One classification rule: a predicate over facts and the constructor it selects.
pub struct Rule {
    pub name: &'static str,
    matches: fn(&Facts) -> bool,
    build: fn(&Classifier, &Facts) -> TaxonomyError,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Ordered rule table. First match wins; `fallback` always matches.
pub const RULES: [Rule; 6] = [
    Rule {
        name: "passthrough",
        matches: |f| f.taxonomy.is_some(),
        build: |_, f| {
            f.taxonomy
                .clone()
                .unwrap_or_else(|| TaxonomyError::internal(OPAQUE_INTERNAL_MESSAGE))
        },
    },
    Rule {
        name: "token",
        matches: |f| f.token.is_some(),
        build: build_token,
    },
    Rule {
        name: "relational",
        matches: |f| f.relational.is_some(),
        build: build_relational,
    },
    Rule {
        name: "schema",
        matches: |f| f.schema.is_some(),
        build: |_, f| {
            TaxonomyError::invalid_fields("Validation failed", f.schema.as_deref().unwrap_or(&[]))
        },
    },
    Rule {
        name: "network",
        matches: |f| f.network.is_some(),
        build: |_, f| {
            let reason = f.network.map(|k| k.to_string());
            TaxonomyError::service_unavailable("Service temporarily unavailable")
                .with_details(json!({ "reason": reason }))
        },
    },
    Rule {
        name: "fallback",
        matches: |_| true,
        build: build_fallback,
    },
];

fn build_token(_: &Classifier, f: &Facts) -> TaxonomyError {
    let message = match f.token {
        Some(TokenFaultKind::Expired) => "Token expired",
        Some(TokenFaultKind::NotYetValid) => "Token not yet valid",
        Some(TokenFaultKind::Malformed) | None => "Invalid token",
    };
    TaxonomyError::authentication(message)
}

fn build_relational(c: &Classifier, f: &Facts) -> TaxonomyError {
    let Some(rel) = &f.relational else {
        return TaxonomyError::database(OPAQUE_DATABASE_MESSAGE);
    };
    let details = json!({ "constraint": rel.constraint, "detail": rel.detail });

    match rel.code.as_deref().and_then(|code| c.codes.class(code)) {
        Some(ConstraintClass::Unique) => {
            TaxonomyError::conflict("Resource already exists").with_details(details)
        }
        Some(ConstraintClass::ForeignKey) => {
            TaxonomyError::validation("Referenced resource does not exist").with_details(details)
        }
        Some(ConstraintClass::NotNull) => {
            TaxonomyError::validation("Required field is missing").with_details(details)
        }
        Some(ConstraintClass::MissingRelation) => TaxonomyError::database("Database schema error"),
        None if c.exposure.internal_messages => TaxonomyError::database(rel.message.clone()),
        None => TaxonomyError::database(OPAQUE_DATABASE_MESSAGE),
    }
}

fn build_fallback(c: &Classifier, f: &Facts) -> TaxonomyError {
    if c.exposure.internal_messages && !f.message.is_empty() {
        TaxonomyError::internal(f.message.clone())
    } else {
        TaxonomyError::internal(OPAQUE_INTERNAL_MESSAGE)
    }
}

/// Pure mapping from arbitrary failures to `TaxonomyError`.
#[derive(Debug, Clone)]
pub struct Classifier {
    codes: Arc<dyn ConstraintCodes>,
    exposure: Exposure,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(PostgresCodes, Exposure::OPAQUE)
    }
}

impl Classifier {
    #[must_use]
    pub fn new(codes: impl ConstraintCodes + 'static, exposure: Exposure) -> Self {
        Self {
            codes: Arc::new(codes),
            exposure,
        }
    }

    #[must_use]
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            codes: cfg.database_backend.codes(),
            exposure: Exposure::for_environment(cfg.environment),
        }
    }

    #[must_use]
    pub fn exposure(&self) -> Exposure {
        self.exposure
    }

    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.codes.backend()
    }

    #[must_use]
    pub fn classify(&self, err: &(dyn Error + 'static)) -> TaxonomyError {
        self.classify_facts(&Facts::gather(err)).1
    }

    /// Classify already gathered facts, returning the name of the matching rule.
    #[must_use]
    pub fn classify_facts(&self, facts: &Facts) -> (&'static str, TaxonomyError) {
        for rule in &RULES {
            if (rule.matches)(facts) {
                return (rule.name, (rule.build)(self, facts));
            }
        }
        ("fallback", build_fallback(self, facts))
    }
}
