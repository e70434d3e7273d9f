//! Rebuild scheduler over the rollup stage graph.
//!
//! Stages depend as Base -> Daily -> {Weekly, Monthly}. Ingestion marks
//! (asset, day) pairs dirty; a rebuild pass recomputes the base and
//! daily buckets of each dirty day from the event store, then only the
//! weekly and monthly buckets those days fall in. Rebuilds are
//! decoupled from ingestion and run on demand or from a periodic loop.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use chainlake_common::config::RollupConfig;
use chainlake_common::time::{day_start, month_start, period_end, week_start};
use chainlake_common::types::{Asset, Resolution, RollupBucket, TimeRange};
use chainlake_common::Result;
use chainlake_store::EventStore;

use crate::base::build_base_buckets;
use crate::bucket_store::RollupStore;
use crate::layered::{build_daily, build_monthly, build_weekly};
use crate::rolling::RollingWindows;

/// Outcome of one rebuild pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub days_rebuilt: u64,
    pub base_buckets: u64,
    pub daily_buckets: u64,
    pub weekly_buckets: u64,
    pub monthly_buckets: u64,
}

/// Messages for the background rebuild task.
enum RebuildMessage {
    Rebuild,
    Shutdown,
}

/// Tracks dirty days and rebuilds the affected buckets.
pub struct RollupScheduler {
    events: Arc<EventStore>,
    rollups: Arc<RollupStore>,
    rolling: Arc<RollingWindows>,
    dirty: Mutex<BTreeSet<(Asset, DateTime<Utc>)>>,
}

impl RollupScheduler {
    pub fn new(
        events: Arc<EventStore>,
        rollups: Arc<RollupStore>,
        rolling: Arc<RollingWindows>,
    ) -> Self {
        Self {
            events,
            rollups,
            rolling,
            dirty: Mutex::new(BTreeSet::new()),
        }
    }

    /// Mark every UTC day overlapping `range` dirty for `asset`.
    pub fn mark_dirty(&self, asset: &str, range: TimeRange) {
        if range.start >= range.end {
            return;
        }
        let mut dirty = self.dirty.lock();
        let mut day = day_start(range.start);
        while day < range.end {
            dirty.insert((asset.to_string(), day));
            day = day + chrono::Duration::days(1);
        }
    }

    pub fn pending_days(&self) -> usize {
        self.dirty.lock().len()
    }

    /// Rebuild every dirty day and the weekly/monthly buckets above it.
    #[instrument(skip(self))]
    pub fn run_pending(&self) -> Result<RebuildReport> {
        let dirty = std::mem::take(&mut *self.dirty.lock());
        if dirty.is_empty() {
            return Ok(RebuildReport::default());
        }

        let mut report = RebuildReport {
            days_rebuilt: dirty.len() as u64,
            ..RebuildReport::default()
        };
        let mut weeks: BTreeSet<(Asset, DateTime<Utc>)> = BTreeSet::new();
        let mut months: BTreeSet<(Asset, DateTime<Utc>)> = BTreeSet::new();

        // Stage 1: base and daily, one dirty day at a time.
        for (asset, day) in dirty {
            let day_range = TimeRange::new(day, period_end(Resolution::Daily, day)?);
            let events = self.events.query(&asset, None, day_range);
            let base = build_base_buckets(&events)?;
            let daily = build_daily(&base)?;
            debug!(
                asset = %asset,
                day = %day.date_naive(),
                events = events.len(),
                base = base.len(),
                "Rebuilt day"
            );

            report.base_buckets += base.len() as u64;
            report.daily_buckets += daily.len() as u64;

            self.rollups.remove_range(&asset, Resolution::Base, day_range);
            self.rollups.put_all(base);
            self.rollups.remove_range(&asset, Resolution::Daily, day_range);
            for bucket in daily {
                self.observe(&bucket);
                self.rollups.put(bucket);
            }

            weeks.insert((asset.clone(), week_start(day)));
            months.insert((asset, month_start(day)));
        }

        // Stage 2: the weekly and monthly buckets those days fall in,
        // recombined from the daily layer only.
        for (asset, week) in weeks {
            let week_range = TimeRange::new(week, period_end(Resolution::Weekly, week)?);
            let daily = self.rollups.get_range(&asset, Resolution::Daily, week_range);
            let weekly = build_weekly(&daily)?;
            report.weekly_buckets += weekly.len() as u64;
            self.rollups.remove_range(&asset, Resolution::Weekly, week_range);
            for bucket in weekly {
                self.observe(&bucket);
                self.rollups.put(bucket);
            }
        }
        for (asset, month) in months {
            let month_range = TimeRange::new(month, period_end(Resolution::Monthly, month)?);
            let daily = self.rollups.get_range(&asset, Resolution::Daily, month_range);
            let monthly = build_monthly(&daily)?;
            report.monthly_buckets += monthly.len() as u64;
            self.rollups.remove_range(&asset, Resolution::Monthly, month_range);
            for bucket in monthly {
                self.observe(&bucket);
                self.rollups.put(bucket);
            }
        }

        info!(
            days = report.days_rebuilt,
            base = report.base_buckets,
            daily = report.daily_buckets,
            weekly = report.weekly_buckets,
            monthly = report.monthly_buckets,
            "Rebuild pass finished"
        );
        Ok(report)
    }

    fn observe(&self, bucket: &RollupBucket) {
        self.rolling
            .observe(&bucket.asset, bucket.resolution, bucket.metrics.total_volume);
    }
}

/// Background rebuild driver: periodic ticks plus on-demand and
/// shutdown messages, same shape as the compaction loop.
pub struct SchedulerLoop {
    scheduler: Arc<RollupScheduler>,
    interval: Duration,
    tx: mpsc::Sender<RebuildMessage>,
    rx: mpsc::Receiver<RebuildMessage>,
}

impl SchedulerLoop {
    pub fn new(scheduler: Arc<RollupScheduler>, interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(8);
        Self {
            scheduler,
            interval,
            tx,
            rx,
        }
    }

    pub fn from_config(scheduler: Arc<RollupScheduler>, config: &RollupConfig) -> Self {
        Self::new(scheduler, Duration::from_secs(config.rebuild_interval_secs))
    }

    /// Handle for triggering a rebuild or shutdown from outside.
    /// Grab before `spawn`.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        let SchedulerLoop {
            scheduler,
            interval,
            mut rx,
            ..
        } = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = scheduler.run_pending() {
                            error!("Periodic rebuild failed: {}", e);
                        }
                    }
                    msg = rx.recv() => {
                        match msg {
                            Some(RebuildMessage::Rebuild) => {
                                match scheduler.run_pending() {
                                    Ok(report) => {
                                        info!(days = report.days_rebuilt, "On-demand rebuild finished");
                                    }
                                    Err(e) => error!("On-demand rebuild failed: {}", e),
                                }
                            }
                            Some(RebuildMessage::Shutdown) | None => {
                                info!("Rebuild loop shutting down");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}

/// Cloneable handle to a running scheduler loop.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<RebuildMessage>,
}

impl SchedulerHandle {
    pub async fn rebuild_now(&self) {
        if self.tx.send(RebuildMessage::Rebuild).await.is_err() {
            error!("Rebuild loop is gone");
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(RebuildMessage::Shutdown).await;
    }
}
