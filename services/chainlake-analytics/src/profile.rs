//! Address profiles rebuilt from the event store.
//!
//! A profile is a pure aggregate of every transfer the address touched
//! for one asset, so a rebuild after a reindex simply replaces the
//! previous profile. Risk indicators and classification are evaluated
//! at finalize time from the accumulated numbers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use chainlake_common::bins::HistogramBins;
use chainlake_common::config::ClassifierConfig;
use chainlake_common::types::{Address, AddressProfile, Asset, RiskLevel, TransferEvent};
use chainlake_store::EventStore;

use crate::classify::classify;
use crate::risk;

/// Running aggregate for one (address, asset) during a rebuild.
#[derive(Debug, Default)]
struct Accumulator {
    sent_count: u64,
    recv_count: u64,
    sent_volume: Decimal,
    recv_volume: Decimal,
    recipients: HashSet<Address>,
    senders: HashSet<Address>,
    counterparties: HashSet<Address>,
    temporal: [u64; 4],
    bins: HistogramBins,
    sent_amounts: Vec<Decimal>,
    first_activity: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
}

impl Accumulator {
    fn record_sent(&mut self, event: &TransferEvent) {
        self.sent_count += 1;
        self.sent_volume += event.amount;
        self.sent_amounts.push(event.amount);
        self.recipients.insert(event.to_addr.clone());
        self.counterparties.insert(event.to_addr.clone());
        self.touch(event);
    }

    fn record_received(&mut self, event: &TransferEvent) {
        self.recv_count += 1;
        self.recv_volume += event.amount;
        self.senders.insert(event.from_addr.clone());
        self.counterparties.insert(event.from_addr.clone());
        self.touch(event);
    }

    /// A self-transfer tallies both directions but is one activity:
    /// touched once, and the address is not its own counterparty.
    fn record_self(&mut self, event: &TransferEvent) {
        self.sent_count += 1;
        self.sent_volume += event.amount;
        self.sent_amounts.push(event.amount);
        self.recv_count += 1;
        self.recv_volume += event.amount;
        self.touch(event);
    }

    fn touch(&mut self, event: &TransferEvent) {
        self.temporal[(event.block_time.hour() / 6) as usize] += 1;
        self.bins.add(&event.amount);
        self.first_activity = Some(match self.first_activity {
            Some(t) => t.min(event.block_time),
            None => event.block_time,
        });
        self.last_activity = Some(match self.last_activity {
            Some(t) => t.max(event.block_time),
            None => event.block_time,
        });
    }

    fn finalize(
        self,
        address: Address,
        asset: Asset,
        classifier: &ClassifierConfig,
    ) -> AddressProfile {
        let (sent_mean, sent_variance) = mean_and_variance(&self.sent_amounts);
        let thresholds = classifier.thresholds_for(&asset);
        let classification = classify(
            self.sent_count + self.recv_count,
            self.sent_volume + self.recv_volume,
            self.counterparties.len() as u64,
            thresholds,
        );

        let mut profile = AddressProfile {
            address,
            asset,
            sent_count: self.sent_count,
            recv_count: self.recv_count,
            sent_volume: self.sent_volume,
            recv_volume: self.recv_volume,
            unique_recipients: self.recipients.len() as u64,
            unique_senders: self.senders.len() as u64,
            temporal_distribution: self.temporal,
            bins: self.bins,
            sent_mean,
            sent_variance,
            first_activity: self.first_activity,
            last_activity: self.last_activity,
            indicators: Default::default(),
            risk_score: 0,
            risk_level: RiskLevel::Normal,
            classification,
        };
        profile.indicators = risk::evaluate(&profile);
        profile.risk_score = profile.indicators.score();
        profile.risk_level = RiskLevel::from_score(profile.risk_score);
        profile
    }
}

fn mean_and_variance(amounts: &[Decimal]) -> (Decimal, f64) {
    if amounts.is_empty() {
        return (Decimal::ZERO, 0.0);
    }
    let sum: Decimal = amounts.iter().sum();
    let mean = sum / Decimal::from(amounts.len() as u64);
    let mean_f = mean.to_f64().unwrap_or(0.0);
    let variance = amounts
        .iter()
        .map(|a| {
            let d = a.to_f64().unwrap_or(0.0) - mean_f;
            d * d
        })
        .sum::<f64>()
        / amounts.len() as f64;
    (mean, variance)
}

/// Profiles keyed by (address, asset), rebuilt from the event store.
pub struct ProfileStore {
    events: Arc<EventStore>,
    classifier: ClassifierConfig,
    profiles: DashMap<(Address, Asset), AddressProfile>,
}

impl ProfileStore {
    pub fn new(events: Arc<EventStore>, classifier: ClassifierConfig) -> Self {
        Self {
            events,
            classifier,
            profiles: DashMap::new(),
        }
    }

    pub fn get(&self, address: &str, asset: &str) -> Option<AddressProfile> {
        self.profiles
            .get(&(address.to_string(), asset.to_string()))
            .map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Recompute every profile for one asset from the live events.
    /// Addresses that no longer appear lose their profile.
    pub fn rebuild_asset(&self, asset: &str) -> usize {
        let events = self.events.snapshot_asset(asset);
        let mut accumulators: HashMap<Address, Accumulator> = HashMap::new();
        for event in &events {
            if event.from_addr == event.to_addr {
                accumulators
                    .entry(event.from_addr.clone())
                    .or_default()
                    .record_self(event);
                continue;
            }
            accumulators
                .entry(event.from_addr.clone())
                .or_default()
                .record_sent(event);
            accumulators
                .entry(event.to_addr.clone())
                .or_default()
                .record_received(event);
        }

        self.profiles.retain(|(_, a), _| a != asset);
        let rebuilt = accumulators.len();
        for (address, acc) in accumulators {
            let profile = acc.finalize(address.clone(), asset.to_string(), &self.classifier);
            self.profiles.insert((address, asset.to_string()), profile);
        }
        debug!(asset, profiles = rebuilt, "Rebuilt address profiles");
        rebuilt
    }

    /// Rebuild profiles for every asset present in the store.
    pub fn rebuild_all(&self) -> usize {
        let mut total = 0;
        for asset in self.events.assets() {
            total += self.rebuild_asset(&asset);
        }
        info!(profiles = total, "Full profile rebuild finished");
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlake_common::types::AddressClass;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn event(
        tx: &str,
        hour: u32,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> TransferEvent {
        TransferEvent {
            tx_id: tx.to_string(),
            event_seq: 0,
            block_height: 1,
            block_time: Utc.with_ymd_and_hms(2024, 3, 5, hour, 30, 0).unwrap(),
            from_addr: from.to_string(),
            to_addr: to.to_string(),
            asset: "ETH".to_string(),
            amount,
            fee: dec!(0.001),
            version: 1,
        }
    }

    fn store_with(events: Vec<TransferEvent>) -> ProfileStore {
        let store = Arc::new(EventStore::new());
        store.upsert(events);
        ProfileStore::new(store, ClassifierConfig::default())
    }

    #[test]
    fn test_profile_accumulates_both_directions() {
        let profiles = store_with(vec![
            event("0x1", 2, "alice", "bob", dec!(10)),
            event("0x2", 9, "alice", "carol", dec!(20)),
            event("0x3", 14, "bob", "alice", dec!(5)),
        ]);
        profiles.rebuild_asset("ETH");

        let alice = profiles.get("alice", "ETH").unwrap();
        assert_eq!(alice.sent_count, 2);
        assert_eq!(alice.recv_count, 1);
        assert_eq!(alice.sent_volume, dec!(30));
        assert_eq!(alice.recv_volume, dec!(5));
        assert_eq!(alice.unique_recipients, 2);
        assert_eq!(alice.unique_senders, 1);
        assert_eq!(alice.sent_mean, dec!(15));
        // One touch in each of the first three 6h windows.
        assert_eq!(alice.temporal_distribution, [1, 1, 1, 0]);
        assert_eq!(alice.total_count(), 3);
        assert_eq!(alice.total_volume(), dec!(35));
        assert_eq!(
            alice.first_activity.unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 5, 2, 30, 0).unwrap()
        );
        assert_eq!(
            alice.last_activity.unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_self_transfer_counts_once() {
        let profiles = store_with(vec![event("0x1", 9, "alice", "alice", dec!(10))]);
        profiles.rebuild_asset("ETH");

        let alice = profiles.get("alice", "ETH").unwrap();
        assert_eq!(alice.sent_count, 1);
        assert_eq!(alice.recv_count, 1);
        assert_eq!(alice.sent_volume, dec!(10));
        assert_eq!(alice.recv_volume, dec!(10));
        // One activity: a single touch in temporal and bins, and the
        // address is not its own counterparty.
        assert_eq!(alice.temporal_distribution, [0, 1, 0, 0]);
        assert_eq!(alice.bins.total_count(), 1);
        assert_eq!(alice.unique_recipients, 0);
        assert_eq!(alice.unique_senders, 0);
    }

    #[test]
    fn test_bins_cover_sent_and_received() {
        let profiles = store_with(vec![
            event("0x1", 2, "alice", "bob", dec!(0.5)),
            event("0x2", 9, "bob", "alice", dec!(500)),
        ]);
        profiles.rebuild_asset("ETH");

        let alice = profiles.get("alice", "ETH").unwrap();
        assert_eq!(alice.bins.total_count(), 2);
        assert_eq!(alice.bins.counts[1], 1);
        assert_eq!(alice.bins.counts[4], 1);
    }

    #[test]
    fn test_whale_classification_from_rebuild() {
        let profiles = store_with(vec![event(
            "0x1",
            12,
            "whale",
            "custody",
            dec!(250000),
        )]);
        profiles.rebuild_asset("ETH");
        let whale = profiles.get("whale", "ETH").unwrap();
        assert_eq!(whale.classification, AddressClass::Whale);
        // One huge transfer also trips the large-infrequent indicator.
        assert!(whale.indicators.large_infrequent);
        assert_eq!(whale.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_rebuild_drops_vanished_addresses() {
        let store = Arc::new(EventStore::new());
        store.upsert(vec![event("0x1", 2, "alice", "bob", dec!(10))]);
        let profiles = ProfileStore::new(store.clone(), ClassifierConfig::default());
        profiles.rebuild_asset("ETH");
        assert!(profiles.get("alice", "ETH").is_some());

        // A reindex rewrites the transfer between different parties.
        let mut replacement = event("0x1", 2, "carol", "dave", dec!(10));
        replacement.version = 2;
        store.upsert(vec![replacement]);
        profiles.rebuild_asset("ETH");

        assert!(profiles.get("alice", "ETH").is_none());
        assert!(profiles.get("bob", "ETH").is_none());
        assert!(profiles.get("carol", "ETH").is_some());
    }

    #[test]
    fn test_rebuild_all_covers_every_asset() {
        let mut usdc = event("0x9", 4, "alice", "bob", dec!(100));
        usdc.asset = "USDC".to_string();
        let profiles = store_with(vec![
            event("0x1", 2, "alice", "bob", dec!(10)),
            usdc,
        ]);
        let total = profiles.rebuild_all();
        assert_eq!(total, 4);
        assert!(profiles.get("alice", "USDC").is_some());
        assert!(profiles.get("alice", "ETH").is_some());
    }
}
