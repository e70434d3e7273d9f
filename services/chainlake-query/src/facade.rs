//! The facade proper: one read surface over the four stores.

use std::sync::Arc;

use tracing::debug;

use chainlake_analytics::ProfileStore;
use chainlake_common::types::{
    AddressProfile, PartitionStatus, Resolution, RollupBucket, TimeRange, TransferEvent,
};
use chainlake_rollup::RollupStore;
use chainlake_store::{EventStore, PartitionTracker};

pub struct QueryFacade {
    events: Arc<EventStore>,
    rollups: Arc<RollupStore>,
    profiles: Arc<ProfileStore>,
    partitions: Arc<PartitionTracker>,
}

impl QueryFacade {
    pub fn new(
        events: Arc<EventStore>,
        rollups: Arc<RollupStore>,
        profiles: Arc<ProfileStore>,
        partitions: Arc<PartitionTracker>,
    ) -> Self {
        Self {
            events,
            rollups,
            profiles,
            partitions,
        }
    }

    /// Transfers for one asset, optionally narrowed to an address,
    /// ordered by block time and truncated to `limit`.
    pub fn get_transfers(
        &self,
        asset: &str,
        address: Option<&str>,
        time_range: TimeRange,
        limit: usize,
    ) -> Vec<TransferEvent> {
        let mut events = self.events.query(asset, address, time_range);
        if events.len() > limit {
            debug!(asset, total = events.len(), limit, "Truncating transfer query");
            events.truncate(limit);
        }
        events
    }

    /// Pre-aggregated buckets for one asset at one resolution.
    pub fn get_rollup(
        &self,
        asset: &str,
        resolution: Resolution,
        period_range: TimeRange,
    ) -> Vec<RollupBucket> {
        self.rollups.get_range(asset, resolution, period_range)
    }

    /// Behavioral profile of one address for one asset, if known.
    pub fn get_address_profile(&self, asset: &str, address: &str) -> Option<AddressProfile> {
        self.profiles.get(address, asset)
    }

    /// Ingestion completeness per height partition.
    pub fn get_partition_status(&self) -> Vec<PartitionStatus> {
        self.partitions.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlake_common::config::ClassifierConfig;
    use chainlake_common::types::PartitionState;
    use chainlake_rollup::build_base_buckets;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn event(tx: &str, hour: u32, amount: Decimal) -> TransferEvent {
        TransferEvent {
            tx_id: tx.to_string(),
            event_seq: 0,
            block_height: 7,
            block_time: Utc.with_ymd_and_hms(2024, 3, 5, hour, 0, 0).unwrap(),
            from_addr: "alice".to_string(),
            to_addr: "bob".to_string(),
            asset: "ETH".to_string(),
            amount,
            fee: dec!(0),
            version: 1,
        }
    }

    fn day() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap(),
        )
    }

    fn facade_with(events: Vec<TransferEvent>) -> QueryFacade {
        let store = Arc::new(EventStore::new());
        store.upsert(events);

        let rollups = Arc::new(RollupStore::new());
        rollups.put_all(build_base_buckets(&store.snapshot_asset("ETH")).unwrap());

        let profiles = Arc::new(ProfileStore::new(
            store.clone(),
            ClassifierConfig::default(),
        ));
        profiles.rebuild_all();

        let partitions = Arc::new(PartitionTracker::new(1000));
        partitions.begin_range(0);
        partitions.observe_height(7);

        QueryFacade::new(store, rollups, profiles, partitions)
    }

    #[test]
    fn test_transfers_respect_limit_and_order() {
        let facade = facade_with(vec![
            event("0x3", 9, dec!(3)),
            event("0x1", 1, dec!(1)),
            event("0x2", 5, dec!(2)),
        ]);
        let transfers = facade.get_transfers("ETH", None, day(), 2);
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].tx_id, "0x1");
        assert_eq!(transfers[1].tx_id, "0x2");

        let by_address = facade.get_transfers("ETH", Some("alice"), day(), 10);
        assert_eq!(by_address.len(), 3);
        assert!(facade
            .get_transfers("ETH", Some("nobody"), day(), 10)
            .is_empty());
    }

    #[test]
    fn test_rollup_lookup() {
        let facade = facade_with(vec![event("0x1", 1, dec!(1)), event("0x2", 5, dec!(2))]);
        let buckets = facade.get_rollup("ETH", Resolution::Base, day());
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].metrics.tx_count, 1);
        assert!(facade.get_rollup("USDC", Resolution::Base, day()).is_empty());
    }

    #[test]
    fn test_profile_lookup() {
        let facade = facade_with(vec![event("0x1", 1, dec!(1))]);
        let profile = facade.get_address_profile("ETH", "alice").unwrap();
        assert_eq!(profile.sent_count, 1);
        assert!(facade.get_address_profile("ETH", "nobody").is_none());
    }

    #[test]
    fn test_partition_status_passthrough() {
        let facade = facade_with(vec![event("0x1", 1, dec!(1))]);
        let status = facade.get_partition_status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].state, PartitionState::Incomplete);
    }
}
