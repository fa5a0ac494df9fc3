//! Extender configuration

use anyhow::{Context, Result};
use scorer_lib::metrics::BackendConfig;
use scorer_lib::ScoringPolicy;
use serde::Deserialize;
use std::path::Path;

/// Extender configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtenderConfig {
    /// Instance name used in log lines (pod name from the downward API)
    pub instance: String,

    /// Port for scheduler callbacks and health/metrics endpoints
    pub port: u16,

    /// Monitoring backend connection
    pub backend: BackendConfig,

    /// Scoring weights and cutoffs
    pub policy: ScoringPolicy,
}

impl Default for ExtenderConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            port: default_port(),
            backend: BackendConfig::default(),
            policy: ScoringPolicy::default(),
        }
    }
}

fn default_instance() -> String {
    std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "scheduler-extender".to_string())
}

fn default_port() -> u16 {
    8888
}

impl ExtenderConfig {
    /// Load configuration from an optional file and `EXTENDER_*` environment variables.
    ///
    /// Nested keys use `__`, e.g. `EXTENDER_BACKEND__QUERY_TIMEOUT_MS=3000`.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("EXTENDER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid extender configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply a port override (`--port` / `PORT`)
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.policy
            .validate()
            .context("Invalid scoring policy")?;
        self.backend.query_url()?;
        if self.backend.query_timeout_ms == 0 {
            anyhow::bail!("backend.query_timeout_ms must be greater than zero");
        }
        if self.backend.node_label.trim().is_empty() {
            anyhow::bail!("backend.node_label must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExtenderConfig::default();
        assert_eq!(config.port, 8888);
        assert_eq!(config.backend.query_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_override() {
        let config = ExtenderConfig::default().with_port(Some(9999));
        assert_eq!(config.port, 9999);
        let config = config.with_port(None);
        assert_eq!(config.port, 9999);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "scheduler-extender-config-{}.toml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
port = 7000

[backend]
base_url = "http://prometheus.monitoring:9090"
query_timeout_ms = 2500

[policy.cutoffs]
max_ratio = 3.0
"#
        )
        .unwrap();

        let config = ExtenderConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.port, 7000);
        assert_eq!(config.backend.base_url, "http://prometheus.monitoring:9090");
        assert_eq!(config.backend.query_timeout_ms, 2500);
        assert_eq!(config.backend.node_label, "node_id");
        assert_eq!(config.policy.cutoffs.max_ratio, 3.0);
        assert_eq!(config.policy.cutoffs.min_ratio, 0.5);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let mut config = ExtenderConfig::default();
        config.policy.cutoffs.max_ratio = 0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = ExtenderConfig::default();
        config.backend.query_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
