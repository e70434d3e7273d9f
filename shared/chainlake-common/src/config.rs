//! Configuration for the Chainlake core.
//!
//! Every config struct loads three ways: `Default`, `from_env()` with
//! `CHAINLAKE_*` variables, and `from_properties()` for host-supplied
//! key/value maps. Classification thresholds are configuration, not
//! hard-coded per asset; an optional per-asset overlay can override the
//! asset-agnostic defaults.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::Asset;

/// Default number of block heights per tracked partition.
pub const DEFAULT_PARTITION_SIZE: u64 = 1000;

fn parse_from<T: std::str::FromStr>(props: &HashMap<String, String>, keys: &[&str]) -> Option<T> {
    keys.iter()
        .find_map(|k| props.get(*k))
        .and_then(|v| v.parse::<T>().ok())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

// ═══════════════════════════════════════════════════════════════════════════
// INGESTION
// ═══════════════════════════════════════════════════════════════════════════

/// Registry of known assets and their on-chain decimal scales.
///
/// Raw integer amounts are scaled by the asset's decimals at extraction.
/// An asset missing from the registry is a fatal configuration error for
/// the affected record: guessing a scale would corrupt every aggregate
/// built on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRegistry {
    /// Symbol of the chain's native asset (value transfers and fees)
    pub native_asset: Asset,
    /// Asset symbol -> decimal places
    pub decimals: HashMap<Asset, u32>,
}

impl Default for AssetRegistry {
    fn default() -> Self {
        let mut decimals = HashMap::new();
        decimals.insert("ETH".to_string(), 18);
        decimals.insert("USDC".to_string(), 6);
        decimals.insert("USDT".to_string(), 6);
        decimals.insert("WBTC".to_string(), 8);
        Self {
            native_asset: "ETH".to_string(),
            decimals,
        }
    }
}

impl AssetRegistry {
    pub fn decimals_for(&self, asset: &str) -> Option<u32> {
        self.decimals.get(asset).copied()
    }

    pub fn register(&mut self, asset: impl Into<Asset>, decimals: u32) {
        self.decimals.insert(asset.into(), decimals);
    }
}

/// Retry behavior for block fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 200,
            max_delay_ms: 30_000,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

/// Ingestion pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Heights per fetch request
    pub fetch_chunk_size: u64,
    /// Pipelined fetches in flight; completion stays in height order
    pub max_concurrent_fetches: usize,
    /// Per-request timeout
    pub fetch_timeout_secs: u64,
    pub retry: RetryConfig,
    pub assets: AssetRegistry,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_chunk_size: 25,
            max_concurrent_fetches: 4,
            fetch_timeout_secs: 30,
            retry: RetryConfig::default(),
            assets: AssetRegistry::default(),
        }
    }
}

impl IngestConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fetch_chunk_size: env_parse("CHAINLAKE_FETCH_CHUNK_SIZE")
                .unwrap_or(defaults.fetch_chunk_size),
            max_concurrent_fetches: env_parse("CHAINLAKE_MAX_CONCURRENT_FETCHES")
                .unwrap_or(defaults.max_concurrent_fetches),
            fetch_timeout_secs: env_parse("CHAINLAKE_FETCH_TIMEOUT_SECS")
                .unwrap_or(defaults.fetch_timeout_secs),
            retry: RetryConfig {
                max_attempts: env_parse("CHAINLAKE_RETRY_MAX_ATTEMPTS")
                    .unwrap_or(defaults.retry.max_attempts),
                initial_delay_ms: env_parse("CHAINLAKE_RETRY_INITIAL_DELAY_MS")
                    .unwrap_or(defaults.retry.initial_delay_ms),
                max_delay_ms: env_parse("CHAINLAKE_RETRY_MAX_DELAY_MS")
                    .unwrap_or(defaults.retry.max_delay_ms),
                exponential_base: env_parse("CHAINLAKE_RETRY_EXPONENTIAL_BASE")
                    .unwrap_or(defaults.retry.exponential_base),
                jitter: env_parse("CHAINLAKE_RETRY_JITTER").unwrap_or(defaults.retry.jitter),
            },
            assets: defaults.assets,
        }
    }

    /// Load from host-supplied properties, falling back to env/defaults.
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        let defaults = Self::from_env();
        Self {
            fetch_chunk_size: parse_from(
                props,
                &["chainlake_fetch_chunk_size", "CHAINLAKE_FETCH_CHUNK_SIZE"],
            )
            .unwrap_or(defaults.fetch_chunk_size),
            max_concurrent_fetches: parse_from(
                props,
                &[
                    "chainlake_max_concurrent_fetches",
                    "CHAINLAKE_MAX_CONCURRENT_FETCHES",
                ],
            )
            .unwrap_or(defaults.max_concurrent_fetches),
            fetch_timeout_secs: parse_from(
                props,
                &["chainlake_fetch_timeout_secs", "CHAINLAKE_FETCH_TIMEOUT_SECS"],
            )
            .unwrap_or(defaults.fetch_timeout_secs),
            retry: defaults.retry,
            assets: defaults.assets,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════

/// Thresholds for the address-classification decision table.
///
/// Asset-agnostic by default; the same table can be overridden per asset
/// through `ClassifierConfig::per_asset_overrides`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierThresholds {
    /// Exchange: at least this many transactions...
    pub exchange_min_tx: u64,
    /// ...and at least this many unique counterparties
    pub exchange_min_counterparties: u64,
    /// Whale: at least this much total volume...
    pub whale_min_volume: Decimal,
    /// ...across at most this many transactions
    pub whale_max_tx: u64,
    /// Hub: at least this many unique counterparties
    pub hub_min_counterparties: u64,
    /// Retail: below this total volume
    pub retail_max_volume: Decimal,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            exchange_min_tx: 1000,
            exchange_min_counterparties: 200,
            whale_min_volume: dec!(100000),
            whale_max_tx: 100,
            hub_min_counterparties: 50,
            retail_max_volume: dec!(100),
        }
    }
}

/// Classification configuration: agnostic defaults plus optional
/// per-asset overlay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub thresholds: ClassifierThresholds,
    pub per_asset_overrides: HashMap<Asset, ClassifierThresholds>,
}

impl ClassifierConfig {
    /// Thresholds that apply to `asset` (overlay wins when present).
    pub fn thresholds_for(&self, asset: &str) -> &ClassifierThresholds {
        self.per_asset_overrides
            .get(asset)
            .unwrap_or(&self.thresholds)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ROLLUP
// ═══════════════════════════════════════════════════════════════════════════

/// Rollup builder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Window length for per-stream moving averages
    pub rolling_window: usize,
    /// Scheduler tick for background rebuilds
    pub rebuild_interval_secs: u64,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            rolling_window: 6,
            rebuild_interval_secs: 60,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TOP-LEVEL
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level configuration for the analytics core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainlakeConfig {
    /// Heights per tracked partition
    pub partition_size: u64,
    pub ingest: IngestConfig,
    pub rollup: RollupConfig,
    pub classifier: ClassifierConfig,
}

impl Default for ChainlakeConfig {
    fn default() -> Self {
        Self {
            partition_size: DEFAULT_PARTITION_SIZE,
            ingest: IngestConfig::default(),
            rollup: RollupConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl ChainlakeConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let partition_size =
            env_parse("CHAINLAKE_PARTITION_SIZE").unwrap_or(DEFAULT_PARTITION_SIZE);
        if partition_size == 0 {
            return Err(anyhow::anyhow!("CHAINLAKE_PARTITION_SIZE must be positive"))
                .context("invalid chainlake configuration");
        }
        Ok(Self {
            partition_size,
            ingest: IngestConfig::from_env(),
            rollup: RollupConfig::default(),
            classifier: ClassifierConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChainlakeConfig::default();
        assert_eq!(config.partition_size, DEFAULT_PARTITION_SIZE);
        assert_eq!(config.ingest.fetch_chunk_size, 25);
        assert_eq!(config.ingest.retry.max_attempts, 5);
        assert_eq!(config.rollup.rolling_window, 6);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = AssetRegistry::default();
        assert_eq!(registry.decimals_for("ETH"), Some(18));
        assert_eq!(registry.decimals_for("USDC"), Some(6));
        assert_eq!(registry.decimals_for("UNKNOWN"), None);
    }

    #[test]
    fn test_properties_override_defaults() {
        let mut props = HashMap::new();
        props.insert("chainlake_fetch_chunk_size".to_string(), "50".to_string());
        props.insert(
            "CHAINLAKE_MAX_CONCURRENT_FETCHES".to_string(),
            "8".to_string(),
        );
        let config = IngestConfig::from_properties(&props);
        assert_eq!(config.fetch_chunk_size, 50);
        assert_eq!(config.max_concurrent_fetches, 8);
        // Untouched keys keep defaults
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn test_classifier_overlay_wins() {
        let mut config = ClassifierConfig::default();
        let strict = ClassifierThresholds {
            whale_min_volume: dec!(5000),
            ..Default::default()
        };
        config
            .per_asset_overrides
            .insert("WBTC".to_string(), strict.clone());

        assert_eq!(config.thresholds_for("WBTC"), &strict);
        assert_eq!(
            config.thresholds_for("ETH"),
            &ClassifierThresholds::default()
        );
    }
}
