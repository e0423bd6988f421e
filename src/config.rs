//! Runtime configuration
//!
//! Loaded from `config/<env>.yaml`; every field has a default so the
//! engine also runs with zero configuration.

use std::fs;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_LOCK_WAIT_MS;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// "hourly", "daily", or anything else for a single file
    pub rotation: String,
    /// Bound on row-lock waits, in milliseconds. A timeout surfaces as
    /// a retriable store error.
    pub lock_wait_ms: u64,
    /// Connection URL for the PostgreSQL backend. The embedded backend
    /// is used when absent.
    pub postgres_url: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "minledger.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            lock_wait_ms: DEFAULT_LOCK_WAIT_MS,
            postgres_url: None,
        }
    }
}

impl LedgerConfig {
    /// Load `config/<env>.yaml`.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config file: {config_path}"))?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML document; unspecified fields take their defaults.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("failed to parse config yaml")
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.lock_wait_ms, DEFAULT_LOCK_WAIT_MS);
        assert!(cfg.postgres_url.is_none());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let cfg = LedgerConfig::from_yaml("lock_wait_ms: 250\nlog_level: debug\n").unwrap();
        assert_eq!(cfg.lock_wait_ms, 250);
        assert_eq!(cfg.lock_wait(), Duration::from_millis(250));
        assert_eq!(cfg.log_level, "debug");
        // untouched fields keep their defaults
        assert_eq!(cfg.rotation, "daily");
    }

    #[test]
    fn test_postgres_url_optional() {
        let cfg =
            LedgerConfig::from_yaml("postgres_url: postgres://ledger@localhost/ledger\n").unwrap();
        assert_eq!(
            cfg.postgres_url.as_deref(),
            Some("postgres://ledger@localhost/ledger")
        );
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(LedgerConfig::from_yaml("lock_wait_ms: [not a number").is_err());
    }
}
