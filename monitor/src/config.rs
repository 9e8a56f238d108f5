//! Combined configuration for the monitor

use anyhow::Context;
use fraud_engine::DetectionConfig;
use ledger_core::Config as LedgerConfig;
use pricing_engine::PricingConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV: &str = "SUPPLY_CONFIG";

/// Configuration of all three components, one TOML table each
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// `[ledger]`
    pub ledger: LedgerConfig,

    /// `[pricing]`
    pub pricing: PricingConfig,

    /// `[detection]`
    pub detection: DetectionConfig,
}

impl MonitorConfig {
    /// Load from the file named by `SUPPLY_CONFIG`, or defaults when unset
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config {}", path))?;
                tracing::info!(%path, "Loading configuration");
                Self::from_toml(&content)
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: MonitorConfig = toml::from_str(content).context("parsing config")?;
        config.ledger.validate()?;
        config.pricing.validate()?;
        config.detection.validate()?;
        Ok(config)
    }
}
