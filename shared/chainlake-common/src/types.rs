//! Type definitions for the Chainlake core.
//!
//! Shared shapes for ingestion (blocks, raw payloads, transfer events),
//! aggregation (rollup buckets and metrics), analytics (address profiles,
//! risk, classification) and partition tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bins::HistogramBins;
use crate::error::ChainlakeError;

/// Asset symbol (e.g. "ETH", "USDC")
pub type Asset = String;

/// Blockchain address
pub type Address = String;

// ═══════════════════════════════════════════════════════════════════════════
// TRANSFER EVENTS
// ═══════════════════════════════════════════════════════════════════════════

/// Stable identity of a transfer event.
///
/// Two events with the same key and different `version` are the same
/// logical fact observed at different ingestion epochs; the store keeps
/// only the highest version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub tx_id: String,
    pub event_seq: u32,
    pub asset: Asset,
}

/// A normalized transfer event extracted from a block.
///
/// Amounts and fees are arbitrary-precision decimals; floating point is
/// never used for sums to avoid rounding drift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferEvent {
    pub tx_id: String,
    pub event_seq: u32,
    pub block_height: u64,
    pub block_time: DateTime<Utc>,
    pub from_addr: Address,
    pub to_addr: Address,
    pub asset: Asset,
    pub amount: Decimal,
    pub fee: Decimal,
    /// Ingestion epoch; last writer (highest version) wins
    pub version: u64,
}

impl TransferEvent {
    /// Identity key for versioned-replace semantics.
    pub fn key(&self) -> EventKey {
        EventKey {
            tx_id: self.tx_id.clone(),
            event_seq: self.event_seq,
            asset: self.asset.clone(),
        }
    }

    /// Validate the event. A malformed event is rejected individually and
    /// never aborts the surrounding batch.
    pub fn validate(&self) -> Result<(), ChainlakeError> {
        if self.tx_id.is_empty() {
            return Err(ChainlakeError::Validation("empty tx_id".to_string()));
        }
        if self.asset.is_empty() {
            return Err(ChainlakeError::Validation(format!(
                "empty asset for tx {}",
                self.tx_id
            )));
        }
        if self.from_addr.is_empty() || self.to_addr.is_empty() {
            return Err(ChainlakeError::Validation(format!(
                "empty address for tx {}",
                self.tx_id
            )));
        }
        if self.amount.is_sign_negative() {
            return Err(ChainlakeError::Validation(format!(
                "negative amount {} for tx {}",
                self.amount, self.tx_id
            )));
        }
        if self.fee.is_sign_negative() {
            return Err(ChainlakeError::Validation(format!(
                "negative fee {} for tx {}",
                self.fee, self.tx_id
            )));
        }
        Ok(())
    }
}

/// Inclusive-start, exclusive-end time window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BLOCKS AND RAW PAYLOADS
// ═══════════════════════════════════════════════════════════════════════════

/// A raw transaction as delivered by the block source.
///
/// `value_raw` and `fee_raw` are integer strings in the chain's smallest
/// unit; scaling to decimals happens at extraction using the asset
/// registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    pub from: Address,
    pub to: Address,
    pub value_raw: String,
    pub fee_raw: String,
}

/// A transfer-shaped log event (token transfers) within a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub tx_hash: String,
    pub log_index: u32,
    pub from: Address,
    pub to: Address,
    pub asset: Asset,
    pub amount_raw: String,
}

/// A block as returned by `BlockSource::get_blocks_by_height_range`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub hash: String,
    pub time: DateTime<Utc>,
    pub transactions: Vec<RawTransaction>,
    pub events: Vec<RawEvent>,
}

// ═══════════════════════════════════════════════════════════════════════════
// PARTITIONS
// ═══════════════════════════════════════════════════════════════════════════

/// Ingestion completeness of a fixed-size block-height range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PartitionState {
    /// Never touched by ingestion
    Absent,
    /// Ingestion started, completeness not yet confirmed
    Incomplete,
    /// A hole was detected; explicit target for reindex
    IncompleteWithGaps,
    /// Every height in the range was observed
    Complete,
}

impl PartitionState {
    pub fn as_str(&self) -> &str {
        match self {
            PartitionState::Absent => "absent",
            PartitionState::Incomplete => "incomplete",
            PartitionState::IncompleteWithGaps => "incomplete_with_gaps",
            PartitionState::Complete => "complete",
        }
    }
}

/// Snapshot of one tracked partition, as exposed to operators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionStatus {
    pub range_id: u64,
    pub start_height: u64,
    pub end_height: u64,
    pub state: PartitionState,
}

/// Half-open height range `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeightRange {
    pub start: u64,
    pub end: u64,
}

impl HeightRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ROLLUP BUCKETS
// ═══════════════════════════════════════════════════════════════════════════

/// Rollup resolution; every resolution above Base is a pure combination
/// of the one below it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    /// 4-hour buckets aligned to UTC midnight
    Base,
    Daily,
    Weekly,
    Monthly,
}

impl Resolution {
    pub fn as_str(&self) -> &str {
        match self {
            Resolution::Base => "base",
            Resolution::Daily => "daily",
            Resolution::Weekly => "weekly",
            Resolution::Monthly => "monthly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "base" | "4h" => Some(Resolution::Base),
            "daily" | "1d" => Some(Resolution::Daily),
            "weekly" | "1w" => Some(Resolution::Weekly),
            "monthly" | "1mo" => Some(Resolution::Monthly),
            _ => None,
        }
    }
}

/// Full metric set for one rollup bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketMetrics {
    pub tx_count: u64,
    pub total_volume: Decimal,
    pub avg_amount: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub median_amount: Decimal,
    pub p10: Decimal,
    pub p25: Decimal,
    pub p75: Decimal,
    pub p90: Decimal,
    pub p99: Decimal,
    /// Population variance of amounts (f64 is acceptable for moments;
    /// sums stay decimal-exact)
    pub variance: f64,
    pub std_dev: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub total_fees: Decimal,
    pub avg_fee: Decimal,
    pub max_fee: Decimal,
    pub unique_senders: u64,
    pub unique_receivers: u64,
    /// Addresses active as sender or receiver
    pub active_addresses: u64,
    /// Unique ordered (sender, receiver) pairs
    pub unique_pairs: u64,
    /// unique_pairs over all possible ordered pairs
    /// (active * (active - 1)); 0 when <= 1 active address
    pub network_density: f64,
    pub bins: HistogramBins,
}

impl BucketMetrics {
    /// All-zero metrics for an empty window.
    pub fn empty() -> Self {
        Self {
            tx_count: 0,
            total_volume: Decimal::ZERO,
            avg_amount: Decimal::ZERO,
            min_amount: Decimal::ZERO,
            max_amount: Decimal::ZERO,
            median_amount: Decimal::ZERO,
            p10: Decimal::ZERO,
            p25: Decimal::ZERO,
            p75: Decimal::ZERO,
            p90: Decimal::ZERO,
            p99: Decimal::ZERO,
            variance: 0.0,
            std_dev: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
            total_fees: Decimal::ZERO,
            avg_fee: Decimal::ZERO,
            max_fee: Decimal::ZERO,
            unique_senders: 0,
            unique_receivers: 0,
            active_addresses: 0,
            unique_pairs: 0,
            network_density: 0.0,
            bins: HistogramBins::default(),
        }
    }
}

/// One pre-aggregated time bucket for an asset at a resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollupBucket {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub asset: Asset,
    pub resolution: Resolution,
    pub metrics: BucketMetrics,
}

// ═══════════════════════════════════════════════════════════════════════════
// ADDRESS ANALYTICS
// ═══════════════════════════════════════════════════════════════════════════

/// Independent boolean risk indicators; the score is their sum.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskIndicators {
    /// >= 80% of activity in the night bucket (00:00-06:00 UTC)
    pub night_heavy: bool,
    /// Sent-amount variance < 5% of mean with >= 20 transactions
    pub fixed_amount: bool,
    /// Exactly one unique recipient with >= 50 sent transactions
    pub single_recipient: bool,
    /// >= 1 top-bin transfer with total transaction count <= 5
    pub large_infrequent: bool,
}

impl RiskIndicators {
    /// Number of indicators set (0-4).
    pub fn score(&self) -> u8 {
        self.night_heavy as u8
            + self.fixed_amount as u8
            + self.single_recipient as u8
            + self.large_infrequent as u8
    }
}

/// Risk level derived from the indicator score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLevel {
    Normal,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0 => RiskLevel::Normal,
            1 => RiskLevel::Low,
            2 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

/// Behavioral classification from the asset-agnostic decision table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AddressClass {
    Exchange,
    Whale,
    Hub,
    Retail,
    Regular,
}

impl AddressClass {
    pub fn as_str(&self) -> &str {
        match self {
            AddressClass::Exchange => "exchange",
            AddressClass::Whale => "whale",
            AddressClass::Hub => "hub",
            AddressClass::Retail => "retail",
            AddressClass::Regular => "regular",
        }
    }
}

/// Behavioral profile of one address for one asset, recomputed from all
/// transfer events where the address is sender or receiver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressProfile {
    pub address: Address,
    pub asset: Asset,
    pub sent_count: u64,
    pub recv_count: u64,
    pub sent_volume: Decimal,
    pub recv_volume: Decimal,
    pub unique_recipients: u64,
    pub unique_senders: u64,
    /// Activity counts per 6-hour UTC bucket; index 0 is 00:00-06:00
    pub temporal_distribution: [u64; 4],
    /// Magnitude bins over every transfer the address touched
    pub bins: HistogramBins,
    pub sent_mean: Decimal,
    /// Population variance of sent amounts
    pub sent_variance: f64,
    pub first_activity: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub indicators: RiskIndicators,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub classification: AddressClass,
}

impl AddressProfile {
    pub fn total_count(&self) -> u64 {
        self.sent_count + self.recv_count
    }

    pub fn total_volume(&self) -> Decimal {
        self.sent_volume + self.recv_volume
    }
}
