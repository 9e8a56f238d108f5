//! Scenario files replayed by the monitor

use anyhow::Context;
use chrono::{DateTime, Utc};
use ledger_core::{ActorId, Amount, Role, Stage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A named sequence of steps run against a fresh system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,

    /// Administrator identity the registry is created with
    #[serde(default = "default_admin")]
    pub admin: ActorId,

    /// Initial clock value (Unix epoch when absent)
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    /// Steps in order
    pub steps: Vec<Step>,
}

fn default_admin() -> ActorId {
    ActorId::new("admin")
}

impl Scenario {
    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Parse JSON text
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("parsing scenario")
    }
}

/// One scenario step. Amounts are decimal units (`"1.5"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Admin grants `role` to `actor`
    GrantRole {
        /// Recipient
        actor: ActorId,
        /// Role granted
        role: Role,
    },
    /// Admin registers or reactivates a producer profile
    Register {
        /// Producer
        actor: ActorId,
    },
    /// `actor` creates a product; `location` is hashed into the location commitment
    Create {
        /// Creator and first owner
        actor: ActorId,
        /// Quantity
        quantity: u64,
        /// Initial price
        price: Decimal,
        /// Provenance text
        #[serde(default)]
        location: String,
    },
    /// `actor` moves a product into `stage`
    Advance {
        /// Caller
        actor: ActorId,
        /// Product id
        product: u64,
        /// Destination stage
        stage: Stage,
    },
    /// Owner hands a product to `to` at `price`
    Transfer {
        /// Current owner
        actor: ActorId,
        /// Product id
        product: u64,
        /// New owner
        to: ActorId,
        /// New price
        price: Decimal,
    },
    /// Oracle publishes a price floor
    SetFloor {
        /// Oracle
        actor: ActorId,
        /// Product id
        product: u64,
        /// Floor price
        price: Decimal,
    },
    /// Validate a sale price for `producer`
    Validate {
        /// Caller
        actor: ActorId,
        /// Product id
        product: u64,
        /// Proposed price
        price: Decimal,
        /// Producer being paid
        producer: ActorId,
    },
    /// Comprehensive fraud analysis of a product
    Analyze {
        /// Caller
        actor: ActorId,
        /// Product id
        product: u64,
    },
    /// Move the replay clock forward
    AdvanceClock {
        /// Minutes to advance
        minutes: i64,
    },
}

impl Step {
    /// Operation name used in reports
    pub fn op(&self) -> &'static str {
        match self {
            Step::GrantRole { .. } => "grant_role",
            Step::Register { .. } => "register",
            Step::Create { .. } => "create",
            Step::Advance { .. } => "advance",
            Step::Transfer { .. } => "transfer",
            Step::SetFloor { .. } => "set_floor",
            Step::Validate { .. } => "validate",
            Step::Analyze { .. } => "analyze",
            Step::AdvanceClock { .. } => "advance_clock",
        }
    }
}

/// Convert decimal units into an [`Amount`]
pub fn to_amount(units: Decimal) -> anyhow::Result<Amount> {
    Amount::from_decimal(units)
        .with_context(|| format!("amount {} is negative or out of range", units))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let scenario = Scenario::from_json(
            r#"{
                "name": "parse",
                "steps": [
                    { "op": "grant_role", "actor": "farmer", "role": "Producer" },
                    { "op": "create", "actor": "farmer", "quantity": 10, "price": "1.5" },
                    { "op": "advance", "actor": "farmer", "product": 1, "stage": "Growing" },
                    { "op": "advance_clock", "minutes": 60 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scenario.admin, ActorId::new("admin"));
        assert!(scenario.start.is_none());
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(
            scenario.steps[2],
            Step::Advance {
                stage: Stage::Growing,
                ..
            }
        ));
        assert_eq!(scenario.steps[3].op(), "advance_clock");
    }

    #[test]
    fn test_to_amount() {
        assert_eq!(
            to_amount(Decimal::new(15, 1)).unwrap(),
            Amount::from_minor(1_500_000)
        );
        assert!(to_amount(Decimal::new(-1, 0)).is_err());
    }
}
