//! In-memory store for pre-aggregated rollup buckets.
//!
//! Writes replace whole buckets; a rebuild first clears the periods it
//! is about to rewrite so buckets that no longer exist disappear.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use chainlake_common::types::{Asset, Resolution, RollupBucket, TimeRange};

type BucketKey = (Resolution, DateTime<Utc>, Asset);

#[derive(Debug, Default)]
pub struct RollupStore {
    buckets: DashMap<BucketKey, RollupBucket>,
}

impl RollupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: RollupBucket) {
        let key = (
            bucket.resolution,
            bucket.period_start,
            bucket.asset.clone(),
        );
        self.buckets.insert(key, bucket);
    }

    pub fn put_all(&self, buckets: Vec<RollupBucket>) {
        for bucket in buckets {
            self.put(bucket);
        }
    }

    pub fn get(
        &self,
        asset: &str,
        resolution: Resolution,
        period_start: DateTime<Utc>,
    ) -> Option<RollupBucket> {
        self.buckets
            .get(&(resolution, period_start, asset.to_string()))
            .map(|entry| entry.clone())
    }

    /// Buckets whose period start falls in `range`, sorted by start.
    pub fn get_range(
        &self,
        asset: &str,
        resolution: Resolution,
        range: TimeRange,
    ) -> Vec<RollupBucket> {
        let mut out: Vec<RollupBucket> = self
            .buckets
            .iter()
            .filter(|entry| {
                let (res, start, bucket_asset) = entry.key();
                *res == resolution && bucket_asset == asset && range.contains(*start)
            })
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by_key(|b| b.period_start);
        out
    }

    /// Remove every bucket for `asset` at `resolution` whose period
    /// start falls in `range`. Returns the number removed.
    pub fn remove_range(&self, asset: &str, resolution: Resolution, range: TimeRange) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|(res, start, bucket_asset), _| {
            !(*res == resolution && bucket_asset == asset && range.contains(*start))
        });
        let removed = before - self.buckets.len();
        if removed > 0 {
            debug!(asset, resolution = resolution.as_str(), removed, "Cleared rollup buckets");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
