//! Pricing notifications

use chrono::{DateTime, Utc};
use ledger_core::{ActorId, Amount, Notification, ProductId};
use serde::{Deserialize, Serialize};

/// Notifications emitted by the pricing engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PricingEvent {
    /// Profile created or reactivated
    ProducerRegistered {
        /// Producer
        actor: ActorId,
        /// Whether an inactive profile was reactivated
        reactivated: bool,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Rating applied
    ProducerRated {
        /// Producer
        actor: ActorId,
        /// Submitted score
        score: u16,
        /// Rating after this score
        rating: u16,
        /// Penalties after this score
        penalty_count: u32,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Profile suspended by penalties
    ProducerDeactivated {
        /// Producer
        actor: ActorId,
        /// Penalties accumulated
        penalty_count: u32,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Price accepted
    PriceValidated {
        /// Validation id
        validation_id: u64,
        /// Product
        product_id: ProductId,
        /// Producer
        producer: ActorId,
        /// Accepted price
        price: Amount,
        /// Minimum in effect
        minimum_price: Amount,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Product floor published
    PriceFloorSet {
        /// Product
        product_id: ProductId,
        /// Floor price
        minimum_price: Amount,
        /// Volatility index (bp)
        volatility_index: u32,
        /// Confidence (bp)
        confidence: u32,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Product floor switched off
    PriceFloorDeactivated {
        /// Product
        product_id: ProductId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Global floor changed
    GlobalFloorUpdated {
        /// New floor
        price: Amount,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Volatility cap changed
    VolatilityThresholdUpdated {
        /// New threshold (bp)
        threshold_bp: u32,
        /// Operation time
        at: DateTime<Utc>,
    },
}

impl Notification for PricingEvent {
    fn name(&self) -> &'static str {
        match self {
            PricingEvent::ProducerRegistered { .. } => "producer_registered",
            PricingEvent::ProducerRated { .. } => "producer_rated",
            PricingEvent::ProducerDeactivated { .. } => "producer_deactivated",
            PricingEvent::PriceValidated { .. } => "price_validated",
            PricingEvent::PriceFloorSet { .. } => "price_floor_set",
            PricingEvent::PriceFloorDeactivated { .. } => "price_floor_deactivated",
            PricingEvent::GlobalFloorUpdated { .. } => "global_floor_updated",
            PricingEvent::VolatilityThresholdUpdated { .. } => "volatility_threshold_updated",
        }
    }
}
