//! Detection configuration

use crate::window::MAX_HISTORY;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of stage transitions with an expected duration
pub const TRANSITIONS: usize = 8;

/// Detection thresholds and expected stage durations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Deviation from the rolling mean that counts as an anomaly (bp)
    pub price_deviation_threshold_bp: u32,

    /// Grace period added to every expected stage duration (minutes)
    pub time_threshold_minutes: u64,

    /// Samples required before price analysis runs
    pub minimum_history: usize,

    /// Confidence at which an anomaly is actionable (bp)
    pub confidence_threshold: u32,

    /// Violations that blacklist an actor
    pub max_violations: u32,

    /// Whether analysis is enabled
    pub active: bool,

    /// Expected minutes spent in each stage before the next one, indexed by
    /// the stage being left (Planted through Retail)
    pub expected_durations_minutes: [u64; TRANSITIONS],
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            price_deviation_threshold_bp: 3000, // 30%
            time_threshold_minutes: 1440,       // 1 day
            minimum_history: 5,
            confidence_threshold: 7000,
            max_violations: 3,
            active: true,
            expected_durations_minutes: [
                43_200, // Planted: 30 days
                86_400, // Growing: 60 days
                2_880,  // Harvested: 2 days
                4_320,  // Processed: 3 days
                1_440,  // Packaged: 1 day
                4_320,  // InTransit: 3 days
                2_880,  // Distributed: 2 days
                10_080, // Retail: 7 days
            ],
        }
    }
}

impl DetectionConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DetectionConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = DetectionConfig::default();

        if let Ok(threshold) = std::env::var("FRAUD_PRICE_DEVIATION_THRESHOLD_BP") {
            config.price_deviation_threshold_bp = threshold.parse().map_err(|e| {
                Error::InvalidConfig(format!("FRAUD_PRICE_DEVIATION_THRESHOLD_BP: {}", e))
            })?;
        }

        if let Ok(minutes) = std::env::var("FRAUD_TIME_THRESHOLD_MINUTES") {
            config.time_threshold_minutes = minutes
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("FRAUD_TIME_THRESHOLD_MINUTES: {}", e)))?;
        }

        if let Ok(active) = std::env::var("FRAUD_DETECTION_ACTIVE") {
            config.active = active
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("FRAUD_DETECTION_ACTIVE: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants
    pub fn validate(&self) -> Result<()> {
        if self.minimum_history == 0 || self.minimum_history > MAX_HISTORY {
            return Err(Error::InvalidConfig(format!(
                "minimum_history must be within 1..={}",
                MAX_HISTORY
            )));
        }
        if self.max_violations == 0 {
            return Err(Error::InvalidConfig(
                "max_violations must be positive".to_string(),
            ));
        }
        if self.price_deviation_threshold_bp == 0 {
            return Err(Error::InvalidConfig(
                "price_deviation_threshold_bp must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
