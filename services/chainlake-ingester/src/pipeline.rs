//! The ingestion pipeline.
//!
//! Fetches are pipelined across chunks (ordered buffered stream) while
//! completion bookkeeping runs strictly in height order, which is what
//! makes hole detection sound. A failed chunk becomes a recorded hole;
//! the pipeline continues past it. Partitions fully covered by the
//! assigned range are finalized; partially covered ones stay incomplete
//! until a covering run finishes them.

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use chainlake_common::config::IngestConfig;
use chainlake_common::types::{Block, HeightRange, PartitionStatus};
use chainlake_common::{ChainlakeError, Result};
use chainlake_store::{EventStore, PartitionTracker, UpsertReport};

use crate::extract::extract_transfers;
use crate::fetcher::BlockFetcher;
use crate::source::BlockSource;

/// Outcome of one ingestion run over a height range.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Correlation id for this run
    pub ingest_id: Uuid,
    pub range: HeightRange,
    /// Epoch stamped as event version
    pub epoch: u64,
    pub blocks_fetched: u64,
    pub upsert: UpsertReport,
    /// Records dropped by validation during extraction
    pub dropped_invalid: u64,
    /// Fatal per-record configuration errors encountered
    pub fatal_config: u64,
    /// Heights that could not be ingested (fetch exhaustion or missing
    /// from the source response)
    pub failed_heights: Vec<u64>,
    /// Earliest block time ingested; feeds rollup invalidation
    pub first_block_time: Option<DateTime<Utc>>,
    /// Latest block time ingested
    pub last_block_time: Option<DateTime<Utc>>,
    /// Final states of partitions fully covered by this run
    pub partitions: Vec<PartitionStatus>,
}

/// Pulls blocks, extracts transfers, feeds the store and the tracker.
pub struct IngestionPipeline {
    fetcher: BlockFetcher,
    store: Arc<EventStore>,
    tracker: Arc<PartitionTracker>,
    config: IngestConfig,
    /// Current ingestion epoch; reindex bumps it
    epoch: AtomicU64,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn BlockSource>,
        store: Arc<EventStore>,
        tracker: Arc<PartitionTracker>,
        config: IngestConfig,
    ) -> Self {
        let fetcher = BlockFetcher::new(
            source,
            config.retry.clone(),
            Duration::from_secs(config.fetch_timeout_secs),
        );
        Self {
            fetcher,
            store,
            tracker,
            config,
            epoch: AtomicU64::new(1),
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Ingest `[range.start, range.end)` at the current epoch.
    #[instrument(skip(self), fields(start = range.start, end = range.end))]
    pub async fn ingest_range(&self, range: HeightRange) -> Result<IngestReport> {
        if range.is_empty() {
            return Err(ChainlakeError::Validation(format!(
                "empty height range [{}, {})",
                range.start, range.end
            )));
        }

        let ingest_id = Uuid::new_v4();
        let epoch = self.current_epoch();
        info!(%ingest_id, epoch, "Ingesting height range");

        // Partitions fully inside the range restart their accounting;
        // partially covered ones are only touched.
        let covered = self.covered_partitions(range);
        for &range_id in &covered {
            self.tracker.begin_range(range_id);
        }
        let first_id = self.tracker.range_id_for(range.start);
        let last_id = self.tracker.range_id_for(range.end - 1);
        for range_id in first_id..=last_id {
            if !covered.contains(&range_id) {
                self.tracker.touch_range(range_id);
            }
        }

        let mut report = IngestReport {
            ingest_id,
            range,
            epoch,
            blocks_fetched: 0,
            upsert: UpsertReport::default(),
            dropped_invalid: 0,
            fatal_config: 0,
            failed_heights: Vec::new(),
            first_block_time: None,
            last_block_time: None,
            partitions: Vec::new(),
        };

        // Pipelined fetches; `buffered` keeps completion in chunk order
        // so accounting stays in height order.
        let chunks = chunk_range(range, self.config.fetch_chunk_size);
        let fetcher = &self.fetcher;
        let mut fetches = stream::iter(chunks)
            .map(|chunk| async move {
                let result = fetcher.fetch_range(chunk.start, chunk.end).await;
                (chunk, result)
            })
            .buffered(self.config.max_concurrent_fetches.max(1));

        while let Some((chunk, result)) = fetches.next().await {
            match result {
                Ok(blocks) => self.ingest_chunk(chunk, blocks, epoch, &mut report),
                Err(e) => {
                    // Failure isolation: record the hole and keep going.
                    warn!(
                        start = chunk.start,
                        end = chunk.end,
                        "Giving up on chunk after retries: {}",
                        e
                    );
                    report.failed_heights.extend(chunk.start..chunk.end);
                }
            }
        }

        // Only explicit finalization is authoritative; a cancelled run
        // leaves partitions incomplete and resumable.
        for &range_id in &covered {
            let state = self.tracker.finalize_range(range_id);
            let bounds = self.tracker.bounds_of(range_id);
            report.partitions.push(PartitionStatus {
                range_id,
                start_height: bounds.start,
                end_height: bounds.end,
                state,
            });
        }
        // Partially covered partitions with failed heights are flagged
        // so repair scheduling sees them.
        for &height in &report.failed_heights {
            let range_id = self.tracker.range_id_for(height);
            if !covered.contains(&range_id) {
                self.tracker.mark_gaps(range_id);
            }
        }

        info!(
            %ingest_id,
            blocks = report.blocks_fetched,
            written = report.upsert.written,
            stale = report.upsert.stale_skipped,
            rejected = report.upsert.rejected,
            failed_heights = report.failed_heights.len(),
            "Ingestion run finished"
        );
        Ok(report)
    }

    /// Re-run a range at a strictly greater epoch; stale rows from the
    /// previous epoch are superseded by version.
    pub async fn reindex_range(&self, range: HeightRange) -> Result<IngestReport> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(epoch, start = range.start, end = range.end, "Reindexing range");
        self.ingest_range(range).await
    }

    /// Reindex every partition the tracker lists as not complete.
    pub async fn repair(&self) -> Result<Vec<IngestReport>> {
        let pending = self.tracker.pending();
        if pending.is_empty() {
            debug!("No partitions pending repair");
            return Ok(Vec::new());
        }

        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut reports = Vec::with_capacity(pending.len());
        for status in pending {
            let range = HeightRange::new(status.start_height, status.end_height);
            reports.push(self.ingest_range(range).await?);
        }
        Ok(reports)
    }

    fn ingest_chunk(
        &self,
        chunk: HeightRange,
        blocks: Vec<Block>,
        epoch: u64,
        report: &mut IngestReport,
    ) {
        let mut by_height: HashMap<u64, Block> = HashMap::with_capacity(blocks.len());
        for block in blocks {
            by_height.insert(block.height, block);
        }

        // Height order within the chunk keeps hole accounting exact.
        for height in chunk.start..chunk.end {
            let Some(block) = by_height.get(&height) else {
                warn!(height, "Height missing from source response");
                report.failed_heights.push(height);
                continue;
            };

            let extracted = extract_transfers(block, &self.config.assets, epoch);
            report.dropped_invalid += extracted.dropped_invalid;
            for fatal in &extracted.fatal {
                error!(height, "Fatal extraction error: {}", fatal);
            }
            report.fatal_config += extracted.fatal.len() as u64;

            let upsert = self.store.upsert(extracted.events);
            report.upsert.absorb(&upsert);
            self.tracker.observe_height(height);
            report.blocks_fetched += 1;
            report.first_block_time = Some(match report.first_block_time {
                Some(t) => t.min(block.time),
                None => block.time,
            });
            report.last_block_time = Some(match report.last_block_time {
                Some(t) => t.max(block.time),
                None => block.time,
            });
        }
    }

    /// Range ids of partitions fully covered by `range`.
    fn covered_partitions(&self, range: HeightRange) -> Vec<u64> {
        let first = self.tracker.range_id_for(range.start);
        let last = self.tracker.range_id_for(range.end - 1);
        (first..=last)
            .filter(|&id| {
                let bounds = self.tracker.bounds_of(id);
                bounds.start >= range.start && bounds.end <= range.end
            })
            .collect()
    }
}

fn chunk_range(range: HeightRange, chunk_size: u64) -> Vec<HeightRange> {
    let size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = range.start;
    while start < range.end {
        let end = (start + size).min(range.end);
        chunks.push(HeightRange::new(start, end));
        start = end;
    }
    chunks
}
