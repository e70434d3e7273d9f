//! Rolling volume windows per (asset, resolution).
//!
//! A fixed-size ring buffer tracks the most recent bucket volumes and
//! yields a moving average as each bucket lands, filling the role a SQL
//! window function would play over the bucket table.

use dashmap::DashMap;
use rust_decimal::Decimal;

use chainlake_common::config::RollupConfig;
use chainlake_common::types::{Asset, Resolution};

/// Fixed-capacity ring of the latest observed values.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: Vec<Decimal>,
    capacity: usize,
    cursor: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            cursor: 0,
        }
    }

    /// Record a value, evicting the oldest once full, and return the
    /// average over the retained values.
    pub fn push(&mut self, value: Decimal) -> Decimal {
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            self.values[self.cursor] = value;
            self.cursor = (self.cursor + 1) % self.capacity;
        }
        self.average()
    }

    pub fn average(&self) -> Decimal {
        if self.values.is_empty() {
            return Decimal::ZERO;
        }
        let sum: Decimal = self.values.iter().sum();
        sum / Decimal::from(self.values.len() as u64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }
}

/// Rolling windows keyed by (asset, resolution).
#[derive(Debug)]
pub struct RollingWindows {
    window_size: usize,
    windows: DashMap<(Asset, Resolution), RollingWindow>,
}

impl RollingWindows {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            windows: DashMap::new(),
        }
    }

    pub fn from_config(config: &RollupConfig) -> Self {
        Self::new(config.rolling_window)
    }

    /// Feed one bucket volume; returns the updated moving average.
    pub fn observe(&self, asset: &str, resolution: Resolution, volume: Decimal) -> Decimal {
        let mut window = self
            .windows
            .entry((asset.to_string(), resolution))
            .or_insert_with(|| RollingWindow::new(self.window_size));
        window.push(volume)
    }

    /// Current moving average, zero before any observation.
    pub fn moving_average(&self, asset: &str, resolution: Resolution) -> Decimal {
        self.windows
            .get(&(asset.to_string(), resolution))
            .map(|w| w.average())
            .unwrap_or(Decimal::ZERO)
    }
}
