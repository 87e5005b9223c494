//! Layered server configuration.
//!
//! defaults -> YAML file (`--config`) -> environment (`LAB__*`) -> CLI overrides

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use labkit::PipelineConfig;
use labkit::telemetry::LoggingConfig;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "LAB__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Requests with larger bodies are rejected before reaching a handler
    pub body_limit_bytes: usize,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8087)),
            body_limit_bytes: 1024 * 1024,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
}

/// Values taken from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub verbose: u8,
}

impl AppConfig {
    /// Load the layered configuration. A missing `path` means defaults plus environment.
    ///
    /// # Errors
    /// Returns an error when the file cannot be parsed or a value has the wrong shape.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load yaml configuration")
    }

    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(port) = cli.port {
            self.server.bind_addr.set_port(port);
        }
        match cli.verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.level),
            2 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
    }

    /// # Errors
    /// Returns the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        anyhow::ensure!(
            self.server.body_limit_bytes > 0,
            "server.body_limit_bytes must be positive"
        );
        anyhow::ensure!(
            self.server.request_timeout_ms > 0,
            "server.request_timeout_ms must be positive"
        );
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// # Errors
    /// Returns an error when the configuration cannot be rendered.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("failed to render configuration as YAML")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use labkit::{DatabaseBackend, Environment};

    #[test]
    fn defaults_validate() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.server.bind_addr.port(), 8087);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn yaml_then_env_then_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.yaml");
        std::fs::write(
            &path,
            "server:\n  bind_addr: \"0.0.0.0:9000\"\npipeline:\n  environment: staging\n  database_backend: mysql\n",
        )
        .unwrap();

        let mut cfg = AppConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(cfg.server.bind_addr.port(), 9000);
        assert_eq!(cfg.pipeline.environment, Environment::Staging);
        assert_eq!(cfg.pipeline.database_backend, DatabaseBackend::Mysql);
        assert_eq!(cfg.logging.level, "info");

        cfg.apply_cli_overrides(&CliOverrides {
            port: Some(9100),
            verbose: 2,
        });
        assert_eq!(cfg.server.bind_addr.port(), 9100);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.yaml");
        std::fs::write(&path, "pipeline:\n  enviroment: production\n").unwrap();
        assert!(AppConfig::load_or_default(Some(&path)).is_err());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let mut cfg = AppConfig::default();
        cfg.server.request_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn yaml_rendering_round_trips() {
        let cfg = AppConfig::default();
        let yaml = cfg.to_yaml().unwrap();
        assert!(yaml.contains("request_id_header"));
        let parsed: AppConfig = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(parsed, cfg);
    }
}
