//! Fair-Pricing Engine
//!
//! Producer protection for supply-chain sales: producer ratings with
//! automatic suspension, per-product minimum support prices published by a
//! price oracle, and the validation gate every sale price must pass.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod types;

pub use config::PricingConfig;
pub use engine::PricingEngine;
pub use error::{Error, Result};
pub use events::PricingEvent;
pub use types::*;
