//! Offline log compaction.
//!
//! Superseded versions accumulate in the event log until a compaction
//! pass rewrites it with only the live slot per identity. Compaction is
//! never on the write path; it runs on demand or from a background loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::event_store::EventStore;

/// Result of one compaction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    pub slots_before: usize,
    pub slots_after: usize,
    pub reclaimed: usize,
}

/// Messages for the background compaction task.
enum CompactionMessage {
    Compact,
    Shutdown,
}

impl EventStore {
    /// Rewrite the log keeping only the highest-version slot per
    /// identity. Atomic with respect to readers and writers.
    pub fn compact(&self) -> CompactionStats {
        let mut inner = self.inner.write();
        let slots_before = inner.log.len();

        // The index is the authority on which slot is live for each
        // identity; rebuild the log from those slots in append order.
        let mut live_slots: Vec<usize> = inner.index.values().map(|entry| entry.slot).collect();
        live_slots.sort_unstable();

        let old_log = std::mem::take(&mut inner.log);
        let mut slot_remap = HashMap::with_capacity(live_slots.len());
        let mut compacted = Vec::with_capacity(live_slots.len());
        for slot in live_slots {
            slot_remap.insert(slot, compacted.len());
            compacted.push(old_log[slot].clone());
        }
        inner.log = compacted;
        for entry in inner.index.values_mut() {
            if let Some(new_slot) = slot_remap.get(&entry.slot) {
                entry.slot = *new_slot;
            }
        }

        let slots_after = inner.log.len();
        let stats = CompactionStats {
            slots_before,
            slots_after,
            reclaimed: slots_before - slots_after,
        };
        debug!(
            before = stats.slots_before,
            after = stats.slots_after,
            "Compacted event log"
        );
        stats
    }
}

/// Background compaction driver in the provider flush-loop style:
/// periodic ticks plus on-demand and shutdown messages.
pub struct Compactor {
    store: Arc<EventStore>,
    interval: Duration,
    tx: mpsc::Sender<CompactionMessage>,
    rx: mpsc::Receiver<CompactionMessage>,
}

impl Compactor {
    pub fn new(store: Arc<EventStore>, interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(8);
        Self {
            store,
            interval,
            tx,
            rx,
        }
    }

    /// Handle for requesting a compaction or shutdown from outside.
    /// Grab before `spawn`.
    pub fn handle(&self) -> CompactorHandle {
        CompactorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Spawn the background loop.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        let Compactor {
            store,
            interval,
            mut rx,
            ..
        } = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = store.compact();
                        if stats.reclaimed > 0 {
                            info!(reclaimed = stats.reclaimed, "Periodic compaction reclaimed slots");
                        }
                    }
                    msg = rx.recv() => {
                        match msg {
                            Some(CompactionMessage::Compact) => {
                                let stats = store.compact();
                                info!(reclaimed = stats.reclaimed, "On-demand compaction finished");
                            }
                            Some(CompactionMessage::Shutdown) | None => {
                                info!("Compaction loop shutting down");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}

/// Cloneable handle to a running compactor.
#[derive(Clone)]
pub struct CompactorHandle {
    tx: mpsc::Sender<CompactionMessage>,
}

impl CompactorHandle {
    pub async fn compact_now(&self) {
        if self.tx.send(CompactionMessage::Compact).await.is_err() {
            error!("Compaction loop is gone");
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(CompactionMessage::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlake_common::types::{TimeRange, TransferEvent};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn event(tx: &str, version: u64, amount: rust_decimal::Decimal) -> TransferEvent {
        TransferEvent {
            tx_id: tx.to_string(),
            event_seq: 0,
            block_height: 1,
            block_time: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
            from_addr: "0xaaa".to_string(),
            to_addr: "0xbbb".to_string(),
            asset: "ETH".to_string(),
            amount,
            fee: dec!(0),
            version,
        }
    }

    #[test]
    fn test_compaction_reclaims_superseded_slots() {
        let store = EventStore::new();
        store.upsert(vec![event("0x1", 1, dec!(1)), event("0x2", 1, dec!(2))]);
        store.upsert(vec![event("0x1", 2, dec!(10))]);
        store.upsert(vec![event("0x1", 3, dec!(20))]);

        assert_eq!(store.stats().log_slots, 4);
        let stats = store.compact();
        assert_eq!(stats.slots_before, 4);
        assert_eq!(stats.slots_after, 2);
        assert_eq!(stats.reclaimed, 2);

        // Live view is unchanged
        let live = store.snapshot_asset("ETH");
        assert_eq!(live.len(), 2);
        let e1 = live.iter().find(|e| e.tx_id == "0x1").unwrap();
        assert_eq!(e1.amount, dec!(20));
        assert_eq!(e1.version, 3);
    }

    #[test]
    fn test_compaction_is_idempotent() {
        let store = EventStore::new();
        store.upsert(vec![event("0x1", 1, dec!(1))]);
        store.upsert(vec![event("0x1", 2, dec!(2))]);

        store.compact();
        let second = store.compact();
        assert_eq!(second.reclaimed, 0);
        assert_eq!(store.stats().live_events, 1);
    }

    #[test]
    fn test_queries_survive_compaction() {
        let store = EventStore::new();
        store.upsert(vec![event("0x1", 1, dec!(1)), event("0x2", 1, dec!(2))]);
        store.upsert(vec![event("0x2", 5, dec!(9))]);
        store.compact();

        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap(),
        );
        let events = store.query("ETH", None, range);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events.iter().find(|e| e.tx_id == "0x2").unwrap().amount,
            dec!(9)
        );
    }
}
