//! Versioned transfer-event store.
//!
//! Log-structured: events append to a log, and a key index maps each
//! identity `(tx_id, event_seq, asset)` to its highest-version slot.
//! A write with a version at or below the stored version is a no-op, so
//! retries and reindex replays are always safe. Superseded slots stay in
//! the log until compaction rewrites it (see `compaction`).

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

use chainlake_common::types::{EventKey, TimeRange, TransferEvent};

/// Outcome of one upsert batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Events written (new identity or higher version)
    pub written: u64,
    /// Events skipped because the stored version was >= the incoming one
    pub stale_skipped: u64,
    /// Events rejected by validation (logged, batch continued)
    pub rejected: u64,
}

impl UpsertReport {
    pub fn absorb(&mut self, other: &UpsertReport) {
        self.written += other.written;
        self.stale_skipped += other.stale_skipped;
        self.rejected += other.rejected;
    }
}

/// Store occupancy counters, for operators and compaction decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Distinct identities currently live
    pub live_events: usize,
    /// Log slots including superseded versions
    pub log_slots: usize,
    /// Slots reclaimable by compaction
    pub superseded_slots: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexEntry {
    pub(crate) version: u64,
    pub(crate) slot: usize,
}

#[derive(Default)]
pub(crate) struct Inner {
    pub(crate) log: Vec<TransferEvent>,
    pub(crate) index: HashMap<EventKey, IndexEntry>,
}

/// In-memory versioned event store.
///
/// All mutation goes through keyed upserts; concurrent writers to the
/// same identity are resolved by version comparison, not by caller-side
/// locking.
#[derive(Default)]
pub struct EventStore {
    pub(crate) inner: RwLock<Inner>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a batch of events with last-writer-wins semantics.
    ///
    /// Each malformed event is rejected individually with a warning; the
    /// rest of the batch proceeds.
    pub fn upsert(&self, events: Vec<TransferEvent>) -> UpsertReport {
        let mut report = UpsertReport::default();
        let mut inner = self.inner.write();

        for event in events {
            if let Err(e) = event.validate() {
                warn!(tx_id = %event.tx_id, asset = %event.asset, "Rejecting malformed event: {}", e);
                report.rejected += 1;
                continue;
            }

            let key = event.key();
            match inner.index.get(&key) {
                Some(existing) if existing.version >= event.version => {
                    debug!(
                        tx_id = %event.tx_id,
                        stored = existing.version,
                        incoming = event.version,
                        "Skipping stale write"
                    );
                    report.stale_skipped += 1;
                }
                _ => {
                    let slot = inner.log.len();
                    let version = event.version;
                    inner.log.push(event);
                    inner.index.insert(key, IndexEntry { version, slot });
                    report.written += 1;
                }
            }
        }

        report
    }

    /// Events for `asset` (optionally touching `address`) within the
    /// half-open time range, in deterministic
    /// (block_time, tx_id, event_seq) order.
    pub fn query(
        &self,
        asset: &str,
        address: Option<&str>,
        range: TimeRange,
    ) -> Vec<TransferEvent> {
        let inner = self.inner.read();
        let mut out: Vec<TransferEvent> = inner
            .index
            .values()
            .map(|entry| &inner.log[entry.slot])
            .filter(|e| e.asset == asset && range.contains(e.block_time))
            .filter(|e| match address {
                Some(addr) => e.from_addr == addr || e.to_addr == addr,
                None => true,
            })
            .cloned()
            .collect();
        sort_deterministic(&mut out);
        out
    }

    /// All live events for one asset, deterministically ordered.
    pub fn snapshot_asset(&self, asset: &str) -> Vec<TransferEvent> {
        let inner = self.inner.read();
        let mut out: Vec<TransferEvent> = inner
            .index
            .values()
            .map(|entry| &inner.log[entry.slot])
            .filter(|e| e.asset == asset)
            .cloned()
            .collect();
        sort_deterministic(&mut out);
        out
    }

    /// All live events, deterministically ordered.
    pub fn snapshot(&self) -> Vec<TransferEvent> {
        let inner = self.inner.read();
        let mut out: Vec<TransferEvent> = inner
            .index
            .values()
            .map(|entry| &inner.log[entry.slot])
            .cloned()
            .collect();
        sort_deterministic(&mut out);
        out
    }

    /// Distinct assets with at least one live event.
    pub fn assets(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut assets: Vec<String> = inner.index.keys().map(|k| k.asset.clone()).collect();
        assets.sort();
        assets.dedup();
        assets
    }

    /// Current version stored for an identity, if any.
    pub fn version_of(&self, key: &EventKey) -> Option<u64> {
        self.inner.read().index.get(key).map(|e| e.version)
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            live_events: inner.index.len(),
            log_slots: inner.log.len(),
            superseded_slots: inner.log.len() - inner.index.len(),
        }
    }

}

fn sort_deterministic(events: &mut [TransferEvent]) {
    events.sort_by(|a, b| {
        a.block_time
            .cmp(&b.block_time)
            .then_with(|| a.tx_id.cmp(&b.tx_id))
            .then_with(|| a.event_seq.cmp(&b.event_seq))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn event(tx: &str, seq: u32, version: u64, amount: rust_decimal::Decimal) -> TransferEvent {
        TransferEvent {
            tx_id: tx.to_string(),
            event_seq: seq,
            block_height: 100,
            block_time: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
            from_addr: "0xaaa".to_string(),
            to_addr: "0xbbb".to_string(),
            asset: "ETH".to_string(),
            amount,
            fee: dec!(0.001),
            version,
        }
    }

    #[test]
    fn test_upsert_writes_and_skips_stale() {
        let store = EventStore::new();

        let report = store.upsert(vec![event("0x1", 0, 2, dec!(5))]);
        assert_eq!(report.written, 1);

        // Lower version is a no-op
        let report = store.upsert(vec![event("0x1", 0, 1, dec!(99))]);
        assert_eq!(report.stale_skipped, 1);
        assert_eq!(report.written, 0);

        // Equal version is also a no-op (idempotent retry)
        let report = store.upsert(vec![event("0x1", 0, 2, dec!(99))]);
        assert_eq!(report.stale_skipped, 1);

        let live = store.snapshot_asset("ETH");
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].amount, dec!(5));
    }

    #[test]
    fn test_higher_version_supersedes() {
        let store = EventStore::new();
        store.upsert(vec![event("0x1", 0, 1, dec!(5))]);
        store.upsert(vec![event("0x1", 0, 3, dec!(7))]);

        let live = store.snapshot_asset("ETH");
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].amount, dec!(7));
        assert_eq!(live[0].version, 3);

        // The superseded slot remains in the log until compaction
        let stats = store.stats();
        assert_eq!(stats.live_events, 1);
        assert_eq!(stats.log_slots, 2);
        assert_eq!(stats.superseded_slots, 1);
    }

    #[test]
    fn test_rejection_does_not_abort_batch() {
        let store = EventStore::new();
        let mut bad = event("0x2", 0, 1, dec!(-1));
        bad.amount = dec!(-1);

        let report = store.upsert(vec![event("0x1", 0, 1, dec!(5)), bad, event("0x3", 0, 1, dec!(2))]);
        assert_eq!(report.written, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(store.stats().live_events, 2);
    }

    #[test]
    fn test_query_filters_and_orders() {
        let store = EventStore::new();
        let mut e1 = event("0xb", 0, 1, dec!(1));
        let mut e2 = event("0xa", 0, 1, dec!(2));
        let mut e3 = event("0xc", 0, 1, dec!(3));
        e1.block_time = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        e2.block_time = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        e3.block_time = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        e3.from_addr = "0xccc".to_string();
        store.upsert(vec![e1, e2, e3]);

        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap(),
        );

        let all = store.query("ETH", None, range);
        assert_eq!(all.len(), 3);
        // Ties on block_time break by tx_id
        assert_eq!(all[0].tx_id, "0xa");
        assert_eq!(all[1].tx_id, "0xb");

        let by_addr = store.query("ETH", Some("0xccc"), range);
        assert_eq!(by_addr.len(), 1);
        assert_eq!(by_addr[0].tx_id, "0xc");

        let none = store.query("USDC", None, range);
        assert!(none.is_empty());
    }

    #[test]
    fn test_assets_listing() {
        let store = EventStore::new();
        let mut usdc = event("0x9", 0, 1, dec!(10));
        usdc.asset = "USDC".to_string();
        store.upsert(vec![event("0x1", 0, 1, dec!(1)), usdc]);
        assert_eq!(store.assets(), vec!["ETH".to_string(), "USDC".to_string()]);
    }
}
