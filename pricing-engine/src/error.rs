//! Error types for the pricing engine

use ledger_core::{ActorId, Amount, ErrorKind, ProductId};
use thiserror::Error;

/// Pricing engine error
#[derive(Debug, Error)]
pub enum Error {
    /// No active profile for the producer
    #[error("Farmer not registered: {0}")]
    FarmerNotRegistered(ActorId),

    /// Proposed price is below the computed minimum
    #[error("Insufficient price: {proposed} is below minimum {minimum}")]
    InsufficientPrice {
        /// Proposed price
        proposed: Amount,
        /// Minimum support price
        minimum: Amount,
    },

    /// Proposed price deviates too far from the market reference
    #[error("Price too volatile: {deviation_bp} bp exceeds {threshold_bp} bp")]
    PriceTooVolatile {
        /// Deviation from market in basis points
        deviation_bp: u128,
        /// Configured threshold
        threshold_bp: u32,
    },

    /// Rating above the maximum
    #[error("Invalid rating {score}: maximum is {max}")]
    InvalidRating {
        /// Submitted score
        score: u16,
        /// Maximum allowed
        max: u16,
    },

    /// Producer already holds an active profile
    #[error("Producer already registered: {0}")]
    AlreadyRegistered(ActorId),

    /// No price floor configured for the product
    #[error("Price floor not found for product {0}")]
    FloorNotFound(ProductId),

    /// Price floor already inactive
    #[error("Price floor already inactive for product {0}")]
    FloorInactive(ProductId),

    /// Unknown validation id
    #[error("Price validation not found: {0}")]
    ValidationNotFound(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the ledger or access policy
    #[error(transparent)]
    Ledger(#[from] ledger_core::Error),
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FarmerNotRegistered(_)
            | Error::FloorNotFound(_)
            | Error::ValidationNotFound(_) => ErrorKind::NotFound,
            Error::InsufficientPrice { .. } | Error::PriceTooVolatile { .. } => {
                ErrorKind::BusinessRule
            }
            Error::InvalidRating { .. } | Error::InvalidConfig(_) => ErrorKind::Validation,
            Error::AlreadyRegistered(_) | Error::FloorInactive(_) => ErrorKind::StateConflict,
            Error::Io(_) => ErrorKind::Internal,
            Error::Ledger(e) => e.kind(),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
