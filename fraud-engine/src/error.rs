//! Error types for the fraud engine

use ledger_core::{ActorId, ErrorKind};
use thiserror::Error;

/// Fraud engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown anomaly id
    #[error("Price anomaly not found: {0}")]
    AnomalyNotFound(u64),

    /// Unknown violation id
    #[error("Time violation not found: {0}")]
    ViolationNotFound(u64),

    /// Anomaly already resolved
    #[error("Price anomaly {0} already resolved")]
    AnomalyAlreadyResolved(u64),

    /// Violation already resolved
    #[error("Time violation {0} already resolved")]
    ViolationAlreadyResolved(u64),

    /// Actor is not blacklisted
    #[error("Actor not blacklisted: {0}")]
    NotBlacklisted(ActorId),

    /// Detection switched off
    #[error("Fraud detection is inactive")]
    DetectionInactive,

    /// Detection already in the requested state
    #[error("Fraud detection already in requested state (active = {active})")]
    ActiveUnchanged {
        /// Requested state
        active: bool,
    },

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
            Error::AnomalyNotFound(_) | Error::ViolationNotFound(_) => ErrorKind::NotFound,
            Error::AnomalyAlreadyResolved(_)
            | Error::ViolationAlreadyResolved(_)
            | Error::NotBlacklisted(_)
            | Error::DetectionInactive
            | Error::ActiveUnchanged { .. } => ErrorKind::StateConflict,
            Error::InvalidConfig(_) => ErrorKind::Validation,
            Error::Io(_) => ErrorKind::Internal,
            Error::Ledger(e) => e.kind(),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
