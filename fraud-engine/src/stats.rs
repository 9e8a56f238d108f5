//! Integer price statistics

use serde::{Deserialize, Serialize};

/// Integer square root by Newton iteration.
///
/// Returns the floor of the real root; `isqrt(0) == 0`.
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }

    // (n + 1) / 2 without overflow
    let mut x = n;
    let mut y = n / 2 + (n & 1);
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// Mean and population standard deviation of a price window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceStats {
    /// Number of samples
    pub samples: usize,

    /// Truncated arithmetic mean
    pub mean: u128,

    /// Population standard deviation (floor)
    pub std_dev: u128,
}

impl PriceStats {
    /// Compute over `prices`. Returns `None` for an empty input.
    pub fn compute(prices: impl Iterator<Item = u128> + Clone) -> Option<Self> {
        let mut samples = 0usize;
        let mut sum = 0u128;
        for price in prices.clone() {
            samples += 1;
            sum = sum.saturating_add(price);
        }
        if samples == 0 {
            return None;
        }

        let n = samples as u128;
        let mean = sum / n;

        let squares = prices.fold(0u128, |acc, price| {
            let diff = price.abs_diff(mean);
            acc.saturating_add(diff.saturating_mul(diff))
        });

        Some(Self {
            samples,
            mean,
            std_dev: isqrt(squares / n),
        })
    }

    /// `mean + k * std_dev`
    pub fn upper_band(&self, k: u128) -> u128 {
        self.mean.saturating_add(self.std_dev.saturating_mul(k))
    }

    /// `mean - k * std_dev`, floored at zero
    pub fn lower_band(&self, k: u128) -> u128 {
        self.mean.saturating_sub(self.std_dev.saturating_mul(k))
    }
}
