//! Fraud Detection Engine
//!
//! Statistical price-anomaly detection over a bounded per-product price
//! history, stage-timing checks against expected stage durations, and
//! per-actor fraud patterns that escalate to blacklisting.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod stats;
pub mod types;
pub mod window;

pub use config::{DetectionConfig, TRANSITIONS};
pub use detector::FraudDetector;
pub use error::{Error, Result};
pub use events::FraudEvent;
pub use stats::{isqrt, PriceStats};
pub use types::*;
pub use window::{PriceHistoryWindow, PriceSample, MAX_HISTORY};
