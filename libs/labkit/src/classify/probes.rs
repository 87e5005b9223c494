//! Structural probes over an error's source chain.
//!
//! A probe looks at one link of the chain and records what it recognizes into
//! `Facts`. The outermost link wins when several links carry the same fact.
//! Probes never decide the final taxonomy variant; the rule table does.

use std::error::Error;
use std::io;

use labkit_errors::{FieldViolation, TaxonomyError};
use labkit_validation::SchemaError;

use super::faults::{
    NetworkFailure, NetworkFaultKind, RelationalFailure, TokenFault, TokenFaultKind,
};

const MAX_CHAIN_DEPTH: usize = 32;

/// Relational diagnostic extracted from a storage failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalFacts {
    pub code: Option<String>,
    pub constraint: Option<String>,
    pub detail: Option<String>,
    pub message: String,
}

/// Everything the probes recognized in one error chain.
#[derive(Debug, Clone, Default)]
pub struct Facts {
    pub taxonomy: Option<TaxonomyError>,
    pub token: Option<TokenFaultKind>,
    pub relational: Option<RelationalFacts>,
    pub schema: Option<Vec<FieldViolation>>,
    pub network: Option<NetworkFaultKind>,
    /// Display of the outermost error
    pub message: String,
    /// Display of every link, outermost first
    pub chain: Vec<String>,
}

pub type Probe = fn(&(dyn Error + 'static), &mut Facts);

pub const PROBES: &[Probe] = &[
    taxonomy,
    json_web_token,
    token_fault,
    sqlx_error,
    relational_failure,
    schema_error,
    io_error,
    elapsed,
    network_failure,
];

impl Facts {
    #[must_use]
    pub fn gather(err: &(dyn Error + 'static)) -> Self {
        let mut facts = Self {
            message: err.to_string(),
            ..Self::default()
        };

        let mut link = Some(err);
        while let Some(e) = link {
            if facts.chain.len() >= MAX_CHAIN_DEPTH {
                break;
            }
            facts.chain.push(e.to_string());
            for probe in PROBES {
                probe(e, &mut facts);
            }
            link = e.source();
        }
        facts
    }
}

fn set<T>(slot: &mut Option<T>, value: T) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn taxonomy(e: &(dyn Error + 'static), facts: &mut Facts) {
    if let Some(err) = e.downcast_ref::<TaxonomyError>() {
        set(&mut facts.taxonomy, err.clone());
    }
}

fn json_web_token(e: &(dyn Error + 'static), facts: &mut Facts) {
    use jsonwebtoken::errors::ErrorKind;

    let Some(err) = e.downcast_ref::<jsonwebtoken::errors::Error>() else {
        return;
    };
    let kind = match err.kind() {
        ErrorKind::ExpiredSignature => TokenFaultKind::Expired,
        ErrorKind::ImmatureSignature => TokenFaultKind::NotYetValid,
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => TokenFaultKind::Malformed,
        // key material and crypto backend problems are server faults
        _ => return,
    };
    set(&mut facts.token, kind);
}

fn token_fault(e: &(dyn Error + 'static), facts: &mut Facts) {
    if let Some(fault) = e.downcast_ref::<TokenFault>() {
        set(&mut facts.token, fault.kind);
    }
}

fn sqlx_error(e: &(dyn Error + 'static), facts: &mut Facts) {
    let Some(err) = e.downcast_ref::<sqlx::Error>() else {
        return;
    };
    match err {
        sqlx::Error::Database(db) => set(
            &mut facts.relational,
            RelationalFacts {
                code: db.code().map(std::borrow::Cow::into_owned),
                constraint: db.constraint().map(str::to_owned),
                // `DatabaseError` exposes no detail; only driver error types do.
                // Wrap in `RelationalFailure::with_detail` to carry one.
                detail: None,
                message: db.message().to_owned(),
            },
        ),
        sqlx::Error::Io(io) => {
            if let Some(kind) = io_fault_kind(io) {
                set(&mut facts.network, kind);
            }
        }
        sqlx::Error::PoolTimedOut => set(&mut facts.network, NetworkFaultKind::TimedOut),
        _ => {}
    }
}

fn relational_failure(e: &(dyn Error + 'static), facts: &mut Facts) {
    if let Some(f) = e.downcast_ref::<RelationalFailure>() {
        set(
            &mut facts.relational,
            RelationalFacts {
                code: Some(f.code.clone()),
                constraint: f.constraint.clone(),
                detail: f.detail.clone(),
                message: f.message.clone(),
            },
        );
    }
}

fn schema_error(e: &(dyn Error + 'static), facts: &mut Facts) {
    if let Some(err) = e.downcast_ref::<SchemaError>() {
        set(&mut facts.schema, err.violations.clone());
    }
}

fn io_error(e: &(dyn Error + 'static), facts: &mut Facts) {
    if let Some(kind) = e.downcast_ref::<io::Error>().and_then(io_fault_kind) {
        set(&mut facts.network, kind);
    }
}

fn elapsed(e: &(dyn Error + 'static), facts: &mut Facts) {
    if e.is::<tokio::time::error::Elapsed>() {
        set(&mut facts.network, NetworkFaultKind::TimedOut);
    }
}

fn network_failure(e: &(dyn Error + 'static), facts: &mut Facts) {
    if let Some(f) = e.downcast_ref::<NetworkFailure>() {
        set(&mut facts.network, f.kind);
    }
}

fn io_fault_kind(err: &io::Error) -> Option<NetworkFaultKind> {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => Some(NetworkFaultKind::ConnectionRefused),
        io::ErrorKind::TimedOut => Some(NetworkFaultKind::TimedOut),
        io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
            Some(NetworkFaultKind::HostNotFound)
        }
        _ if is_dns_failure(&err.to_string()) => Some(NetworkFaultKind::HostNotFound),
        _ => None,
    }
}

fn is_dns_failure(message: &str) -> bool {
    const MARKERS: [&str; 3] = [
        "failed to lookup address information",
        "Name or service not known",
        "nodename nor servname provided",
    ];
    MARKERS.iter().any(|m| message.contains(m))
}
