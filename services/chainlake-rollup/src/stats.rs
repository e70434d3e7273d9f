//! Descriptive statistics over a sorted slice of amounts.
//!
//! Sums, averages and quantiles stay decimal-exact; the central moments
//! (variance, skewness, kurtosis) are computed in f64, which is enough
//! precision for shape measures.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Distribution summary of one bucket's amounts.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountStats {
    pub count: u64,
    pub sum: Decimal,
    pub avg: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub median: Decimal,
    pub p10: Decimal,
    pub p25: Decimal,
    pub p75: Decimal,
    pub p90: Decimal,
    pub p99: Decimal,
    pub variance: f64,
    pub std_dev: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl AmountStats {
    pub fn zero() -> Self {
        Self {
            count: 0,
            sum: Decimal::ZERO,
            avg: Decimal::ZERO,
            min: Decimal::ZERO,
            max: Decimal::ZERO,
            median: Decimal::ZERO,
            p10: Decimal::ZERO,
            p25: Decimal::ZERO,
            p75: Decimal::ZERO,
            p90: Decimal::ZERO,
            p99: Decimal::ZERO,
            variance: 0.0,
            std_dev: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
        }
    }

    /// Compute the full summary. `sorted` must be ascending.
    pub fn compute(sorted: &[Decimal]) -> Self {
        if sorted.is_empty() {
            return Self::zero();
        }

        let count = sorted.len() as u64;
        let sum: Decimal = sorted.iter().sum();
        let avg = sum / Decimal::from(count);

        let (variance, skewness, kurtosis) = moments(sorted);

        Self {
            count,
            sum,
            avg,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: quantile(sorted, 0.5),
            p10: quantile(sorted, 0.10),
            p25: quantile(sorted, 0.25),
            p75: quantile(sorted, 0.75),
            p90: quantile(sorted, 0.90),
            p99: quantile(sorted, 0.99),
            variance,
            std_dev: variance.sqrt(),
            skewness,
            kurtosis,
        }
    }
}

/// Nearest-rank quantile of an ascending slice.
pub fn quantile(sorted: &[Decimal], q: f64) -> Decimal {
    if sorted.is_empty() {
        return Decimal::ZERO;
    }
    let idx = (q * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Population variance, skewness and excess kurtosis.
///
/// Degenerate distributions (a single value, or all values equal) have
/// zero variance; skewness and kurtosis are reported as 0 in that case
/// rather than dividing by zero.
fn moments(sorted: &[Decimal]) -> (f64, f64, f64) {
    let n = sorted.len() as f64;
    let values: Vec<f64> = sorted.iter().map(|d| d.to_f64().unwrap_or(0.0)).collect();
    let mean = values.iter().sum::<f64>() / n;

    let mut m2 = 0.0;
    let mut m3 = 0.0;
    let mut m4 = 0.0;
    for v in &values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    m2 /= n;
    m3 /= n;
    m4 /= n;

    if m2 <= f64::EPSILON {
        return (0.0, 0.0, 0.0);
    }
    let skewness = m3 / m2.powf(1.5);
    let kurtosis = m4 / (m2 * m2) - 3.0;
    (m2, skewness, kurtosis)
}
