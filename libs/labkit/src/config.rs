//! Pipeline configuration.
//!
//! Every field has a default so the section can be omitted entirely from the
//! host configuration file.

use std::sync::Arc;

use http::HeaderName;
use labkit_validation::ValidationOptions;
use serde::{Deserialize, Serialize};

use crate::classify::codes::{ConstraintCodes, MySqlCodes, PostgresCodes, SqliteCodes};

/// Deployment environment. Only `Development` exposes internal failure messages,
/// so it has to be selected explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Staging,
    #[default]
    Production,
}

impl Environment {
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Storage backend whose diagnostic codes the classifier understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    Mysql,
    Sqlite,
}

impl DatabaseBackend {
    #[must_use]
    pub fn codes(self) -> Arc<dyn ConstraintCodes> {
        match self {
            Self::Postgres => Arc::new(PostgresCodes),
            Self::Mysql => Arc::new(MySqlCodes),
            Self::Sqlite => Arc::new(SqliteCodes),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineConfigError {
    #[error("invalid request id header '{name}': {source}")]
    RequestIdHeader {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("invalid redacted header '{name}': {source}")]
    RedactedHeader {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub environment: Environment,
    /// Header carrying the correlation id in both directions
    pub request_id_header: String,
    pub database_backend: DatabaseBackend,
    /// Include the (truncated) request body in error log records
    pub log_request_body: bool,
    pub body_log_limit_bytes: usize,
    /// Header names whose values are replaced before logging
    pub redact_headers: Vec<String>,
    /// Top-level JSON body keys whose values are replaced before logging
    pub redact_body_fields: Vec<String>,
    pub validation: ValidationOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            request_id_header: crate::context::DEFAULT_REQUEST_ID_HEADER.to_owned(),
            database_backend: DatabaseBackend::default(),
            log_request_body: true,
            body_log_limit_bytes: 4096,
            redact_headers: ["authorization", "cookie", "set-cookie", "x-api-key"]
                .map(str::to_owned)
                .to_vec(),
            redact_body_fields: ["password", "token", "secret"]
                .map(str::to_owned)
                .to_vec(),
            validation: ValidationOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// # Errors
    /// Returns an error when the configured header name is not a valid HTTP header name.
    pub fn request_id_header(&self) -> Result<HeaderName, PipelineConfigError> {
        HeaderName::try_from(self.request_id_header.to_ascii_lowercase()).map_err(|source| {
            PipelineConfigError::RequestIdHeader {
                name: self.request_id_header.clone(),
                source,
            }
        })
    }

    /// # Errors
    /// Returns an error for the first entry that is not a valid HTTP header name.
    pub fn redacted_headers(&self) -> Result<Vec<HeaderName>, PipelineConfigError> {
        self.redact_headers
            .iter()
            .map(|name| {
                HeaderName::try_from(name.to_ascii_lowercase()).map_err(|source| {
                    PipelineConfigError::RedactedHeader {
                        name: name.clone(),
                        source,
                    }
                })
            })
            .collect()
    }

    /// Check every derived value once, at startup.
    ///
    /// # Errors
    /// Returns the first invalid header name.
    pub fn validate(&self) -> Result<(), PipelineConfigError> {
        self.request_id_header()?;
        self.redacted_headers()?;
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.request_id_header().unwrap().as_str(), "x-request-id");
        assert_eq!(cfg.redacted_headers().unwrap().len(), 4);
        assert_eq!(cfg.environment, Environment::Production);
        assert!(!cfg.environment.is_development());
    }

    #[test]
    fn omitted_environment_is_production() {
        let cfg: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.environment, Environment::Production);

        let dev: PipelineConfig = serde_json::from_str(r#"{"environment": "development"}"#).unwrap();
        assert!(dev.environment.is_development());
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{"environment": "production", "database_backend": "mysql", "validation": {"abort_early": true}}"#,
        )
        .unwrap();

        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.database_backend, DatabaseBackend::Mysql);
        assert!(cfg.validation.abort_early);
        assert!(cfg.validation.strip_unknown);
        assert_eq!(cfg.body_log_limit_bytes, 4096);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<PipelineConfig, _> = serde_json::from_str(r#"{"enviroment": "test"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn bad_header_name_is_reported() {
        let cfg = PipelineConfig {
            request_id_header: "bad header".to_owned(),
            ..PipelineConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("bad header"));
    }

    #[test]
    fn backend_selects_code_table() {
        assert_eq!(DatabaseBackend::Sqlite.codes().backend(), "sqlite");
        assert_eq!(DatabaseBackend::Postgres.codes().backend(), "postgres");
    }
}
