//! Amount-magnitude histogram bins.
//!
//! Seven fixed bins classify transfers by size independently of the
//! asset: `<0.1, [0.1,1), [1,10), [10,100), [100,1e3), [1e3,1e4), >=1e4`.
//! Bins are exhaustive and disjoint: every amount falls in exactly one.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Number of histogram bins
pub const BIN_COUNT: usize = 7;

/// Upper bounds of bins 0..=5; bin 6 is open-ended.
pub const BIN_BOUNDS: [Decimal; BIN_COUNT - 1] = [
    dec!(0.1),
    dec!(1),
    dec!(10),
    dec!(100),
    dec!(1000),
    dec!(10000),
];

/// Human-readable bin labels, for operator-facing output.
pub const BIN_LABELS: [&str; BIN_COUNT] = [
    "<0.1",
    "0.1-1",
    "1-10",
    "10-100",
    "100-1k",
    "1k-10k",
    ">=10k",
];

/// Index of the bin an amount falls into.
pub fn bin_index(amount: &Decimal) -> usize {
    for (i, bound) in BIN_BOUNDS.iter().enumerate() {
        if amount < bound {
            return i;
        }
    }
    BIN_COUNT - 1
}

/// Per-bin transaction counts and volume sums.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistogramBins {
    pub counts: [u64; BIN_COUNT],
    pub volumes: [Decimal; BIN_COUNT],
}

impl HistogramBins {
    /// Record one transfer.
    pub fn add(&mut self, amount: &Decimal) {
        let i = bin_index(amount);
        self.counts[i] += 1;
        self.volumes[i] += *amount;
    }

    /// Combine with another bin set (bins sum across rollup layers).
    pub fn merge(&mut self, other: &HistogramBins) {
        for i in 0..BIN_COUNT {
            self.counts[i] += other.counts[i];
            self.volumes[i] += other.volumes[i];
        }
    }

    /// Sum of all bin counts; equals the total event count by the
    /// exhaustiveness invariant.
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Sum of all bin volumes; equals the total volume exactly.
    pub fn total_volume(&self) -> Decimal {
        self.volumes.iter().copied().sum()
    }

    /// Whether the top (largest-magnitude) bin is populated.
    pub fn has_top_bin_activity(&self) -> bool {
        self.counts[BIN_COUNT - 1] > 0
    }
}
