//! Partition tracker: ingestion completeness per block-height range.
//!
//! Heights are grouped into fixed-size ranges. A range transitions
//! `absent -> incomplete -> complete`, or to `incomplete_with_gaps` when
//! finalization finds heights that were never observed. Completion is
//! confirmed by height-presence accounting, never by "no error seen".
//! Readers never mutate tracker state.

use dashmap::DashMap;
use std::collections::HashSet;
use tracing::{debug, warn};

use chainlake_common::types::{HeightRange, PartitionState, PartitionStatus};

#[derive(Debug)]
struct RangeRecord {
    start_height: u64,
    end_height: u64,
    state: PartitionState,
    /// Heights confirmed ingested in this range
    observed: HashSet<u64>,
}

/// Tracks ingestion completeness for fixed-size height ranges.
///
/// Created lazily when ingestion first touches a range; mutated only by
/// the ingestion pipeline.
pub struct PartitionTracker {
    partition_size: u64,
    ranges: DashMap<u64, RangeRecord>,
}

impl PartitionTracker {
    pub fn new(partition_size: u64) -> Self {
        assert!(partition_size > 0, "partition size must be positive");
        Self {
            partition_size,
            ranges: DashMap::new(),
        }
    }

    pub fn partition_size(&self) -> u64 {
        self.partition_size
    }

    /// Range id containing `height`.
    pub fn range_id_for(&self, height: u64) -> u64 {
        height / self.partition_size
    }

    /// Height bounds `[start, end)` of a range id.
    pub fn bounds_of(&self, range_id: u64) -> HeightRange {
        HeightRange::new(
            range_id * self.partition_size,
            (range_id + 1) * self.partition_size,
        )
    }

    /// Mark a range as being (re)ingested. Resets observation state so a
    /// reindex starts its accounting from scratch.
    pub fn begin_range(&self, range_id: u64) {
        let bounds = self.bounds_of(range_id);
        self.ranges.insert(
            range_id,
            RangeRecord {
                start_height: bounds.start,
                end_height: bounds.end,
                state: PartitionState::Incomplete,
                observed: HashSet::with_capacity(self.partition_size as usize),
            },
        );
        debug!(range_id, start = bounds.start, end = bounds.end, "Began partition ingestion");
    }

    /// Ensure a range record exists without resetting accounting (used
    /// for ranges only partially covered by an ingest run).
    pub fn touch_range(&self, range_id: u64) {
        let bounds = self.bounds_of(range_id);
        self.ranges.entry(range_id).or_insert_with(|| RangeRecord {
            start_height: bounds.start,
            end_height: bounds.end,
            state: PartitionState::Incomplete,
            observed: HashSet::with_capacity(self.partition_size as usize),
        });
    }

    /// Record that `height` was fully ingested.
    pub fn observe_height(&self, height: u64) {
        let range_id = self.range_id_for(height);
        let bounds = self.bounds_of(range_id);
        let mut record = self.ranges.entry(range_id).or_insert_with(|| RangeRecord {
            start_height: bounds.start,
            end_height: bounds.end,
            state: PartitionState::Incomplete,
            observed: HashSet::with_capacity(self.partition_size as usize),
        });
        record.observed.insert(height);
    }

    /// Confirm or refute completeness of a range by presence accounting.
    /// Returns the resulting state.
    pub fn finalize_range(&self, range_id: u64) -> PartitionState {
        let Some(mut record) = self.ranges.get_mut(&range_id) else {
            return PartitionState::Absent;
        };

        let expected = record.end_height - record.start_height;
        let missing = (record.start_height..record.end_height)
            .filter(|h| !record.observed.contains(h))
            .count() as u64;

        record.state = if missing == 0 {
            PartitionState::Complete
        } else {
            warn!(
                range_id,
                missing,
                expected,
                "Partition finalized with gaps"
            );
            PartitionState::IncompleteWithGaps
        };
        record.state
    }

    /// Force a range into the gap state (e.g. after fetch exhaustion).
    pub fn mark_gaps(&self, range_id: u64) {
        if let Some(mut record) = self.ranges.get_mut(&range_id) {
            record.state = PartitionState::IncompleteWithGaps;
        }
    }

    /// Current state of a range; Absent if never touched.
    pub fn state_of(&self, range_id: u64) -> PartitionState {
        self.ranges
            .get(&range_id)
            .map(|r| r.state)
            .unwrap_or(PartitionState::Absent)
    }

    /// Heights of a range not yet observed; the concrete hole list.
    pub fn missing_heights(&self, range_id: u64) -> Vec<u64> {
        match self.ranges.get(&range_id) {
            Some(record) => (record.start_height..record.end_height)
                .filter(|h| !record.observed.contains(h))
                .collect(),
            None => {
                let bounds = self.bounds_of(range_id);
                (bounds.start..bounds.end).collect()
            }
        }
    }

    /// Snapshot of all tracked ranges, sorted by range id.
    pub fn status(&self) -> Vec<PartitionStatus> {
        let mut out: Vec<PartitionStatus> = self
            .ranges
            .iter()
            .map(|entry| PartitionStatus {
                range_id: *entry.key(),
                start_height: entry.start_height,
                end_height: entry.end_height,
                state: entry.state,
            })
            .collect();
        out.sort_by_key(|s| s.range_id);
        out
    }

    /// Ranges not yet complete, the explicit target list for repair
    /// and reindex scheduling.
    pub fn pending(&self) -> Vec<PartitionStatus> {
        self.status()
            .into_iter()
            .filter(|s| s.state != PartitionState::Complete)
            .collect()
    }
}
