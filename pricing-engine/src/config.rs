//! Pricing configuration

use crate::{Error, Result};
use ledger_core::{Amount, BASIS_POINTS};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pricing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Global minimum support price, in units
    pub global_floor: Decimal,

    /// Maximum accepted deviation from the market price in basis points
    pub volatility_threshold_bp: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            global_floor: Decimal::ONE,
            volatility_threshold_bp: 2000, // 20%
        }
    }
}

impl PricingConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PricingConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = PricingConfig::default();

        if let Ok(floor) = std::env::var("PRICING_GLOBAL_FLOOR") {
            config.global_floor = floor
                .parse()
                .map_err(|e| Error::InvalidConfig(format!("PRICING_GLOBAL_FLOOR: {}", e)))?;
        }

        if let Ok(threshold) = std::env::var("PRICING_VOLATILITY_THRESHOLD_BP") {
            config.volatility_threshold_bp = threshold.parse().map_err(|e| {
                Error::InvalidConfig(format!("PRICING_VOLATILITY_THRESHOLD_BP: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Global floor in minor units
    pub fn global_floor_amount(&self) -> Result<Amount> {
        match Amount::from_decimal(self.global_floor) {
            Some(amount) if !amount.is_zero() => Ok(amount),
            _ => Err(Error::InvalidConfig(format!(
                "global_floor must be positive, got {}",
                self.global_floor
            ))),
        }
    }

    /// Check invariants
    pub fn validate(&self) -> Result<()> {
        self.global_floor_amount()?;
        validate_threshold(self.volatility_threshold_bp)
    }
}

pub(crate) fn validate_threshold(threshold_bp: u32) -> Result<()> {
    if threshold_bp == 0 || u128::from(threshold_bp) > BASIS_POINTS {
        return Err(Error::InvalidConfig(format!(
            "volatility_threshold_bp must be within 1..={}, got {}",
            BASIS_POINTS, threshold_bp
        )));
    }
    Ok(())
}
