//! Engine configuration.
//!
//! ```toml
//! [database]
//! path = "/var/lib/labflow/labflow.db"
//! busy_timeout_ms = 5000
//!
//! [identifiers]
//! order_prefix = "ORD"
//! payment_prefix = "PAY"
//! invoice_prefix = "INV"
//! strategy = "counter"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub identifiers: IdentifierConfig,
}

/// Store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; `None` opens an in-memory store
    pub path: Option<PathBuf>,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// How sequence numbers for human-readable identifiers are obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStrategy {
    /// Atomic per-prefix, per-day counter row
    #[default]
    Counter,
    /// One more than the identifiers already stored for the day.
    /// Two interleaved transactions can read the same count.
    CountExisting,
}

/// Identifier generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentifierConfig {
    pub order_prefix: String,
    pub payment_prefix: String,
    pub invoice_prefix: String,
    pub strategy: SequenceStrategy,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            order_prefix: "ORD".to_string(),
            payment_prefix: "PAY".to_string(),
            invoice_prefix: "INV".to_string(),
            strategy: SequenceStrategy::Counter,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ids = &self.identifiers;
        for (key, prefix) in [
            ("order_prefix", &ids.order_prefix),
            ("payment_prefix", &ids.payment_prefix),
            ("invoice_prefix", &ids.invoice_prefix),
        ] {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be non-empty ASCII alphanumeric, got {:?}",
                    key, prefix
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.identifiers.order_prefix, "ORD");
        assert_eq!(config.identifiers.payment_prefix, "PAY");
        assert_eq!(config.identifiers.invoice_prefix, "INV");
        assert_eq!(config.identifiers.strategy, SequenceStrategy::Counter);
        assert!(config.database.path.is_none());
        assert_eq!(config.database.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_full_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            [database]
            path = "/tmp/lab.db"
            busy_timeout_ms = 250

            [identifiers]
            order_prefix = "LAB"
            strategy = "count_existing"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/lab.db")));
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.identifiers.order_prefix, "LAB");
        assert_eq!(config.identifiers.strategy, SequenceStrategy::CountExisting);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = EngineConfig::from_toml_str("[database]\nbusy_timeout_ms = 0\n").unwrap();
        assert_eq!(config.database.busy_timeout_ms, 0);
        assert_eq!(config.identifiers, IdentifierConfig::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labflow.toml");
        std::fs::write(
            &path,
            "[database]\nbusy_timeout_ms = 100\n\n[identifiers]\norder_prefix = \"LAB\"\n",
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.database.busy_timeout_ms, 100);
        assert_eq!(config.identifiers.order_prefix, "LAB");

        let err = EngineConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_rejects_bad_prefix() {
        let err = EngineConfig::from_toml_str("[identifiers]\norder_prefix = \"OR-D\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("[identifiers]\ninvoice_prefix = \"\"\n").unwrap_err();
        assert!(err.to_string().contains("invoice_prefix"));

        let err = EngineConfig::from_toml_str("[identifiers]\nstrategy = \"random\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
