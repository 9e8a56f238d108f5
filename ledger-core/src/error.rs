//! Error types for the ledger

use crate::access::{DenialReason, Role};
use crate::types::{ActorId, ProductId, Stage};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error category shared by every component of the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown product or record id
    NotFound,
    /// Caller lacks the required role or ownership
    Authorization,
    /// Zero / out-of-range input or exceeded list bound
    Validation,
    /// Business rule violated (price floor, volatility, ...)
    BusinessRule,
    /// Operation conflicts with current state
    StateConflict,
    /// Mutations are paused
    Paused,
    /// Configuration or environment failure
    Internal,
}

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Product not found (unknown, erased or sentinel id)
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Caller not authorized for the operation
    #[error("Unauthorized: {actor} ({reason})")]
    Unauthorized {
        /// Caller
        actor: ActorId,
        /// Why the policy denied the call
        reason: DenialReason,
    },

    /// Mutations are paused
    #[error("Operations are paused")]
    Paused,

    /// Quantity must be positive
    #[error("Invalid quantity: must be positive")]
    InvalidQuantity,

    /// Price must be positive
    #[error("Invalid price: must be positive")]
    InvalidPrice,

    /// Quality score outside the allowed range
    #[error("Invalid quality score {score}: maximum is {max}")]
    InvalidQualityScore {
        /// Submitted score
        score: u16,
        /// Maximum allowed
        max: u16,
    },

    /// Content hash list bound exceeded
    #[error("Exceeds max content hashes ({limit})")]
    ExceedsMaxContentHashes {
        /// Configured bound
        limit: usize,
    },

    /// New owner is the sentinel identity
    #[error("Invalid actor: sentinel identity")]
    InvalidActor,

    /// Stage would move backwards
    #[error("Stage regression from {from} to {to}")]
    StageRegression {
        /// Current stage
        from: Stage,
        /// Requested stage
        to: Stage,
    },

    /// Role already held
    #[error("Actor {actor} already holds role {role}")]
    RoleAlreadyGranted {
        /// Actor
        actor: ActorId,
        /// Role
        role: Role,
    },

    /// Role not held
    #[error("Actor {actor} does not hold role {role}")]
    RoleNotHeld {
        /// Actor
        actor: ActorId,
        /// Role
        role: Role,
    },

    /// Pause requested while already paused
    #[error("Already paused")]
    AlreadyPaused,

    /// Unpause requested while not paused
    #[error("Not paused")]
    NotPaused,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProductNotFound(_) => ErrorKind::NotFound,
            Error::Unauthorized { .. } => ErrorKind::Authorization,
            Error::Paused => ErrorKind::Paused,
            Error::InvalidQuantity
            | Error::InvalidPrice
            | Error::InvalidQualityScore { .. }
            | Error::ExceedsMaxContentHashes { .. }
            | Error::InvalidActor => ErrorKind::Validation,
            Error::StageRegression { .. }
            | Error::RoleAlreadyGranted { .. }
            | Error::RoleNotHeld { .. }
            | Error::AlreadyPaused
            | Error::NotPaused => ErrorKind::StateConflict,
            Error::Config(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Build the error for a policy denial
    pub fn denied(actor: &ActorId, reason: DenialReason) -> Self {
        match reason {
            DenialReason::Paused => Error::Paused,
            reason => Error::Unauthorized {
                actor: actor.clone(),
                reason,
            },
        }
    }
}
