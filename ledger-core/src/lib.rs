//! Supply-chain Ledger Core
//!
//! Authoritative product custody records: who owns a product, which
//! lifecycle stage it is in, what it was last sold for, and which quality
//! observations and documents are attached to it.
//!
//! # Architecture
//!
//! - **Access policy**: every mutation asks [`AccessPolicy`] for a decision
//! - **Single writer**: mutating operations take `&mut self`, so they cannot
//!   interleave or re-enter
//! - **Notifications**: every mutation emits one [`LedgerEvent`] to an
//!   [`EventSink`]
//! - **Read contract**: other components see products only through
//!   [`ProductSource`]
//!
//! # Invariants
//!
//! - Product ids are sequential and never reused
//! - Owners are never the sentinel identity
//! - Stages never move backwards (configurable)
//! - A failed operation leaves no partial state

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod types;

// Re-exports
pub use access::{AccessPolicy, AccessRegistry, Action, Decision, DenialReason, Role, RoleSet};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use events::{EventSink, LedgerEvent, MemorySink, Notification, TracingSink};
pub use ledger::{ProductLedger, ProductSource};
pub use types::{
    ActorId, Amount, ContentHash, ProductId, ProductRecord, QualityHistory, QualityObservation,
    Stage, BASIS_POINTS,
};
