//! Core types for the pricing engine

use chrono::{DateTime, Utc};
use ledger_core::{ActorId, Amount, ProductId};
use serde::{Deserialize, Serialize};

/// Highest rating a producer can receive
pub const MAX_RATING: u16 = 1000;

/// Rating reported before any rating has been applied
pub const DEFAULT_RATING: u16 = MAX_RATING / 2;

/// Ratings strictly below this count as a penalty
pub const LOW_RATING_CUTOFF: u16 = MAX_RATING / 4;

/// Ratings strictly above this earn a price bonus
pub const BONUS_RATING_GATE: u16 = MAX_RATING / 2;

/// Penalties that suspend a profile
pub const PENALTY_THRESHOLD: u32 = 5;

/// Producer profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerProfile {
    /// Producer identity
    pub actor: ActorId,

    /// Registration or last reactivation time
    pub registered_at: DateTime<Utc>,

    /// Sum of every rating ever applied
    pub rating_sum: u64,

    /// Number of ratings applied
    pub rating_count: u64,

    /// Successful price validations
    pub transaction_count: u64,

    /// Low ratings since the last (re)activation
    pub penalty_count: u32,

    /// Whether the producer may transact
    pub active: bool,
}

impl ProducerProfile {
    /// Fresh active profile
    pub fn new(actor: ActorId, registered_at: DateTime<Utc>) -> Self {
        Self {
            actor,
            registered_at,
            rating_sum: 0,
            rating_count: 0,
            transaction_count: 0,
            penalty_count: 0,
            active: true,
        }
    }

    /// Integer-truncated average of all ratings, or [`DEFAULT_RATING`]
    /// before the first one
    pub fn current_rating(&self) -> u16 {
        if self.rating_count == 0 {
            return DEFAULT_RATING;
        }
        // An average of values <= MAX_RATING always fits
        (self.rating_sum / self.rating_count) as u16
    }
}

/// Per-product minimum support price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPriceFloor {
    /// Product
    pub product_id: ProductId,

    /// Minimum support price
    pub minimum_price: Amount,

    /// Last oracle update
    pub updated_at: DateTime<Utc>,

    /// Distance from the global floor in basis points
    pub volatility_index: u32,

    /// 10000 minus the capped volatility index
    pub confidence: u32,

    /// Whether the floor participates in minimum price computation
    pub active: bool,
}

/// A single applied rating, kept for audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingEntry {
    /// Score
    pub score: u16,

    /// Free-text reason
    pub reason: String,

    /// Protection-role actor who rated
    pub rated_by: ActorId,

    /// When it was applied
    pub rated_at: DateTime<Utc>,
}

/// Record of an accepted price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceValidation {
    /// Sequential id (starting at 1)
    pub id: u64,

    /// Product
    pub product_id: ProductId,

    /// Producer being paid
    pub producer: ActorId,

    /// Accepted price
    pub price: Amount,

    /// Minimum in effect at validation time
    pub minimum_price: Amount,

    /// Market reference price
    pub market_price: Amount,

    /// Validation time
    pub validated_at: DateTime<Utc>,
}

/// Breakdown of a minimum support price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Greater of the active product floor and the global floor
    pub base: Amount,

    /// Rating bonus on top of the base
    pub bonus: Amount,

    /// `base + bonus`
    pub minimum: Amount,

    /// Producer rating used for the bonus
    pub rating: u16,

    /// Market price supplied by the caller
    pub market_price: Amount,

    /// Deviation of the market price from the minimum in basis points
    /// (absent when the minimum is zero)
    pub market_deviation_bp: Option<u128>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_rating_default_and_average() {
        let mut profile = ProducerProfile::new(ActorId::new("farmer"), Utc::now());
        assert_eq!(profile.current_rating(), DEFAULT_RATING);

        profile.rating_sum = 800 + 901;
        profile.rating_count = 2;
        assert_eq!(profile.current_rating(), 850);
    }
}
