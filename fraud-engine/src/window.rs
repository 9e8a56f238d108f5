//! Bounded per-product price history

use chrono::{DateTime, Utc};
use ledger_core::{Amount, Stage};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Samples kept per product
pub const MAX_HISTORY: usize = 100;

/// One observation of a product's price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Price at observation time
    pub price: Amount,

    /// Product timestamp at observation time
    pub recorded_at: DateTime<Utc>,

    /// Stage at observation time
    pub stage: Stage,
}

/// FIFO window of the most recent [`MAX_HISTORY`] samples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryWindow {
    samples: VecDeque<PriceSample>,
}

impl PriceHistoryWindow {
    /// Empty window
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_HISTORY),
        }
    }

    /// Append a sample, evicting the oldest once full
    pub fn push(&mut self, sample: PriceSample) {
        if self.samples.len() == MAX_HISTORY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample was recorded
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PriceSample> + '_ {
        self.samples.iter()
    }

    /// Prices in minor units, oldest first
    pub fn prices(&self) -> impl Iterator<Item = u128> + Clone + '_ {
        self.samples.iter().map(|s| s.price.minor())
    }

    /// Oldest sample
    pub fn oldest(&self) -> Option<&PriceSample> {
        self.samples.front()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&PriceSample> {
        self.samples.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(minor: u128) -> PriceSample {
        PriceSample {
            price: Amount::from_minor(minor),
            recorded_at: DateTime::<Utc>::default(),
            stage: Stage::Planted,
        }
    }

    #[test]
    fn test_fifo_eviction() {
        let mut window = PriceHistoryWindow::new();
        for i in 1..=101 {
            window.push(sample(i));
        }

        assert_eq!(window.len(), MAX_HISTORY);
        // Entry #1 is gone, entry #101 is present
        assert_eq!(window.oldest().unwrap().price.minor(), 2);
        assert_eq!(window.latest().unwrap().price.minor(), 101);
        assert!(window.prices().all(|p| p != 1));
    }
}
