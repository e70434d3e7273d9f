//! Transfer extraction from raw block payloads.
//!
//! Two transfer shapes come out of a block: the native-coin value of
//! each transaction (event_seq 0) and token-transfer log events
//! (event_seq = log_index + 1, so native and token transfers of the
//! same transaction never collide on identity). Raw integer amounts are
//! scaled to decimals using the asset registry; an asset with unknown
//! decimals is a fatal configuration problem for that record, because a
//! guessed scale would corrupt every aggregate downstream.

use rust_decimal::Decimal;
use tracing::warn;

use chainlake_common::config::AssetRegistry;
use chainlake_common::types::{Block, TransferEvent};
use chainlake_common::ChainlakeError;

/// Result of extracting one block.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub events: Vec<TransferEvent>,
    /// Records dropped by validation (logged, extraction continued)
    pub dropped_invalid: u64,
    /// Fatal per-record configuration errors, surfaced to the caller
    pub fatal: Vec<ChainlakeError>,
}

/// Scale a raw integer amount string by an asset's decimals.
fn scale_raw(raw: &str, decimals: u32) -> Result<Decimal, ChainlakeError> {
    let value: i128 = raw
        .parse()
        .map_err(|_| ChainlakeError::Validation(format!("unparseable raw amount '{}'", raw)))?;
    if value < 0 {
        return Err(ChainlakeError::Validation(format!(
            "negative raw amount '{}'",
            raw
        )));
    }
    Decimal::try_from_i128_with_scale(value, decimals)
        .map_err(|e| ChainlakeError::Validation(format!("unscalable amount '{}': {}", raw, e)))
}

/// Extract all transfer events from a block, stamping `epoch` as the
/// event version.
pub fn extract_transfers(block: &Block, registry: &AssetRegistry, epoch: u64) -> ExtractReport {
    let mut report = ExtractReport::default();

    let native_decimals = match registry.decimals_for(&registry.native_asset) {
        Some(d) => Some(d),
        None => {
            // Without native decimals every transaction value is
            // unscalable; report once per block.
            report.fatal.push(ChainlakeError::Config(format!(
                "no decimals registered for native asset '{}'",
                registry.native_asset
            )));
            None
        }
    };

    for tx in &block.transactions {
        let Some(decimals) = native_decimals else {
            break;
        };
        let amount = match scale_raw(&tx.value_raw, decimals) {
            Ok(a) => a,
            Err(e) => {
                warn!(tx = %tx.hash, height = block.height, "Dropping transaction value: {}", e);
                report.dropped_invalid += 1;
                continue;
            }
        };
        let fee = match scale_raw(&tx.fee_raw, decimals) {
            Ok(f) => f,
            Err(e) => {
                warn!(tx = %tx.hash, height = block.height, "Dropping transaction fee: {}", e);
                report.dropped_invalid += 1;
                continue;
            }
        };

        report.events.push(TransferEvent {
            tx_id: tx.hash.clone(),
            event_seq: 0,
            block_height: block.height,
            block_time: block.time,
            from_addr: tx.from.clone(),
            to_addr: tx.to.clone(),
            asset: registry.native_asset.clone(),
            amount,
            fee,
            version: epoch,
        });
    }

    for ev in &block.events {
        let Some(decimals) = registry.decimals_for(&ev.asset) else {
            report.fatal.push(ChainlakeError::Config(format!(
                "unknown decimals for asset '{}' in tx {}",
                ev.asset, ev.tx_hash
            )));
            continue;
        };
        let amount = match scale_raw(&ev.amount_raw, decimals) {
            Ok(a) => a,
            Err(e) => {
                warn!(tx = %ev.tx_hash, log_index = ev.log_index, "Dropping log transfer: {}", e);
                report.dropped_invalid += 1;
                continue;
            }
        };

        report.events.push(TransferEvent {
            tx_id: ev.tx_hash.clone(),
            event_seq: ev.log_index + 1,
            block_height: block.height,
            block_time: block.time,
            from_addr: ev.from.clone(),
            to_addr: ev.to.clone(),
            asset: ev.asset.clone(),
            amount,
            // Fees are paid in the native asset by the transaction, not
            // per token log
            fee: Decimal::ZERO,
            version: epoch,
        });
    }

    report
}
