//! Layered rollup builders: daily from base, weekly and monthly from
//! daily. Coarser layers never touch raw events.
//!
//! Combinator rules: counts, volumes, fees and bins sum; unique-address
//! counts take the max of the children (cross-bucket identity is not
//! tracked, so the max is a documented lower-bound approximation);
//! density and the statistical moments average; averages are recomputed
//! exactly from the combined sums; min/max take min/max.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use chainlake_common::bins::HistogramBins;
use chainlake_common::time::{align, period_end};
use chainlake_common::types::{Asset, BucketMetrics, Resolution, RollupBucket};
use chainlake_common::{ChainlakeError, Result};

/// Daily buckets from base buckets.
pub fn build_daily(base: &[RollupBucket]) -> Result<Vec<RollupBucket>> {
    build_layer(base, Resolution::Base, Resolution::Daily)
}

/// Weekly (ISO, Monday start) buckets from daily buckets.
pub fn build_weekly(daily: &[RollupBucket]) -> Result<Vec<RollupBucket>> {
    build_layer(daily, Resolution::Daily, Resolution::Weekly)
}

/// Monthly buckets from daily buckets.
pub fn build_monthly(daily: &[RollupBucket]) -> Result<Vec<RollupBucket>> {
    build_layer(daily, Resolution::Daily, Resolution::Monthly)
}

fn build_layer(
    children: &[RollupBucket],
    child_resolution: Resolution,
    resolution: Resolution,
) -> Result<Vec<RollupBucket>> {
    let mut groups: BTreeMap<(DateTime<Utc>, Asset), Vec<&BucketMetrics>> = BTreeMap::new();
    for child in children {
        if child.resolution != child_resolution {
            return Err(ChainlakeError::Validation(format!(
                "cannot build {} buckets from {} input",
                resolution.as_str(),
                child.resolution.as_str()
            )));
        }
        let start = align(resolution, child.period_start);
        groups
            .entry((start, child.asset.clone()))
            .or_default()
            .push(&child.metrics);
    }

    let mut buckets = Vec::with_capacity(groups.len());
    for ((period_start, asset), metrics) in groups {
        buckets.push(RollupBucket {
            period_start,
            period_end: period_end(resolution, period_start)?,
            asset,
            resolution,
            metrics: combine_children(&metrics),
        });
    }
    Ok(buckets)
}

/// Fold child metrics into one parent bucket.
pub fn combine_children(children: &[&BucketMetrics]) -> BucketMetrics {
    if children.is_empty() {
        return BucketMetrics::empty();
    }

    let mut out = BucketMetrics::empty();
    let mut bins = HistogramBins::default();
    let mut min_amount: Option<Decimal> = None;

    // Moments, density and the order statistics are not recoverable
    // from summaries, so they average across children.
    let mut median_sum = Decimal::ZERO;
    let mut p10_sum = Decimal::ZERO;
    let mut p25_sum = Decimal::ZERO;
    let mut p75_sum = Decimal::ZERO;
    let mut p90_sum = Decimal::ZERO;
    let mut p99_sum = Decimal::ZERO;
    let mut variance_sum = 0.0;
    let mut std_dev_sum = 0.0;
    let mut skewness_sum = 0.0;
    let mut kurtosis_sum = 0.0;
    let mut density_sum = 0.0;

    for m in children {
        out.tx_count += m.tx_count;
        out.total_volume += m.total_volume;
        out.total_fees += m.total_fees;
        bins.merge(&m.bins);

        out.unique_senders = out.unique_senders.max(m.unique_senders);
        out.unique_receivers = out.unique_receivers.max(m.unique_receivers);
        out.active_addresses = out.active_addresses.max(m.active_addresses);
        out.unique_pairs = out.unique_pairs.max(m.unique_pairs);

        min_amount = Some(match min_amount {
            Some(current) => current.min(m.min_amount),
            None => m.min_amount,
        });
        out.max_amount = out.max_amount.max(m.max_amount);
        out.max_fee = out.max_fee.max(m.max_fee);

        median_sum += m.median_amount;
        p10_sum += m.p10;
        p25_sum += m.p25;
        p75_sum += m.p75;
        p90_sum += m.p90;
        p99_sum += m.p99;
        variance_sum += m.variance;
        std_dev_sum += m.std_dev;
        skewness_sum += m.skewness;
        kurtosis_sum += m.kurtosis;
        density_sum += m.network_density;
    }

    let n_dec = Decimal::from(children.len() as u64);
    let n_f = children.len() as f64;

    out.bins = bins;
    out.min_amount = min_amount.unwrap_or(Decimal::ZERO);
    out.median_amount = median_sum / n_dec;
    out.p10 = p10_sum / n_dec;
    out.p25 = p25_sum / n_dec;
    out.p75 = p75_sum / n_dec;
    out.p90 = p90_sum / n_dec;
    out.p99 = p99_sum / n_dec;
    out.variance = variance_sum / n_f;
    out.std_dev = std_dev_sum / n_f;
    out.skewness = skewness_sum / n_f;
    out.kurtosis = kurtosis_sum / n_f;
    out.network_density = density_sum / n_f;

    if out.tx_count > 0 {
        out.avg_amount = out.total_volume / Decimal::from(out.tx_count);
        out.avg_fee = out.total_fees / Decimal::from(out.tx_count);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn base_bucket(day: u32, hour: u32, asset: &str, metrics: BucketMetrics) -> RollupBucket {
        let period_start = Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap();
        RollupBucket {
            period_start,
            period_end: period_end(Resolution::Base, period_start).unwrap(),
            asset: asset.to_string(),
            resolution: Resolution::Base,
            metrics,
        }
    }

    fn metrics(tx_count: u64, volume: Decimal, senders: u64) -> BucketMetrics {
        let mut m = BucketMetrics::empty();
        m.tx_count = tx_count;
        m.total_volume = volume;
        m.avg_amount = volume / Decimal::from(tx_count);
        m.min_amount = dec!(1);
        m.max_amount = volume;
        m.median_amount = dec!(2);
        m.total_fees = Decimal::from(tx_count) * dec!(0.01);
        m.max_fee = dec!(0.01);
        m.unique_senders = senders;
        m.unique_receivers = senders;
        m.active_addresses = senders;
        m.unique_pairs = senders;
        m.network_density = 0.5;
        m.variance = 4.0;
        m.std_dev = 2.0;
        for _ in 0..tx_count {
            m.bins.add(&(volume / Decimal::from(tx_count)));
        }
        m
    }

    #[test]
    fn test_daily_sums_and_recomputed_average() {
        let base = vec![
            base_bucket(5, 0, "ETH", metrics(10, dec!(100), 4)),
            base_bucket(5, 4, "ETH", metrics(30, dec!(50), 8)),
            base_bucket(6, 0, "ETH", metrics(5, dec!(25), 2)),
        ];
        let daily = build_daily(&base).unwrap();
        assert_eq!(daily.len(), 2);

        let day5 = &daily[0];
        assert_eq!(
            day5.period_start,
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
        );
        assert_eq!(
            day5.period_end,
            Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap()
        );
        assert_eq!(day5.resolution, Resolution::Daily);
        assert_eq!(day5.metrics.tx_count, 40);
        assert_eq!(day5.metrics.total_volume, dec!(150));
        // avg is recomputed from combined sums, not averaged.
        assert_eq!(day5.metrics.avg_amount, dec!(3.75));
        assert_eq!(day5.metrics.total_fees, dec!(0.40));
        // unique counts take the max child.
        assert_eq!(day5.metrics.unique_senders, 8);
        assert_eq!(day5.metrics.active_addresses, 8);
    }

    #[test]
    fn test_weekly_and_monthly_group_daily_buckets() {
        // 2024-03-04 (Mon) through 2024-03-11 (next Mon) spans two
        // ISO weeks but one month.
        let mut daily = Vec::new();
        for day in [4u32, 5, 10, 11] {
            let period_start = Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap();
            daily.push(RollupBucket {
                period_start,
                period_end: period_end(Resolution::Daily, period_start).unwrap(),
                asset: "ETH".to_string(),
                resolution: Resolution::Daily,
                metrics: metrics(1, dec!(10), 1),
            });
        }

        let weekly = build_weekly(&daily).unwrap();
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].metrics.tx_count, 3);
        assert_eq!(weekly[1].metrics.tx_count, 1);
        assert_eq!(
            weekly[1].period_start,
            Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()
        );

        let monthly = build_monthly(&daily).unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].metrics.tx_count, 4);
        assert_eq!(monthly[0].metrics.total_volume, dec!(40));
        assert_eq!(
            monthly[0].period_end,
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_moments_and_density_average() {
        let a = metrics(10, dec!(100), 4);
        let mut b = metrics(10, dec!(100), 4);
        b.network_density = 0.1;
        b.variance = 2.0;
        let combined = combine_children(&[&a, &b]);
        assert!((combined.network_density - 0.3).abs() < 1e-12);
        assert!((combined.variance - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bins_sum_across_children() {
        let a = metrics(4, dec!(20), 1); // four tx of 5, bin 2
        let b = metrics(2, dec!(400), 1); // two tx of 200, bin 4
        let combined = combine_children(&[&a, &b]);
        assert_eq!(combined.bins.counts[2], 4);
        assert_eq!(combined.bins.counts[4], 2);
        assert_eq!(combined.bins.total_count(), 6);
    }

    #[test]
    fn test_layer_rejects_wrong_input_resolution() {
        let period_start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let weekly_input = vec![RollupBucket {
            period_start,
            period_end: period_end(Resolution::Weekly, period_start).unwrap(),
            asset: "ETH".to_string(),
            resolution: Resolution::Weekly,
            metrics: BucketMetrics::empty(),
        }];
        assert!(build_daily(&weekly_input).is_err());
    }
}
