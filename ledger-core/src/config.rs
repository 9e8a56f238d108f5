//! Configuration for the ledger

use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Maximum content hashes per product (and per quality history)
    pub max_content_hashes: usize,

    /// Maximum quality score
    pub max_quality_score: u16,

    /// Reject stage changes that move a product backwards
    pub enforce_monotonic_stages: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "ledger-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            max_content_hashes: 50,
            max_quality_score: 1000,
            enforce_monotonic_stages: true,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(max) = std::env::var("LEDGER_MAX_CONTENT_HASHES") {
            config.max_content_hashes = max
                .parse()
                .map_err(|e| crate::Error::Config(format!("LEDGER_MAX_CONTENT_HASHES: {}", e)))?;
        }

        if let Ok(flag) = std::env::var("LEDGER_ENFORCE_MONOTONIC_STAGES") {
            config.enforce_monotonic_stages = flag.parse().map_err(|e| {
                crate::Error::Config(format!("LEDGER_ENFORCE_MONOTONIC_STAGES: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_content_hashes == 0 {
            return Err(crate::Error::Config(
                "max_content_hashes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
