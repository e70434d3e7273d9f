//! Time-bucket rollups over the event store.
//!
//! The base builder groups transfer events into 4-hour UTC buckets;
//! layered builders combine those into daily, weekly and monthly
//! buckets without touching raw events again. A scheduler tracks which
//! days a reindex dirtied and rebuilds only the affected buckets.

pub mod base;
pub mod bucket_store;
pub mod layered;
pub mod rolling;
pub mod scheduler;
pub mod stats;

pub use base::build_base_buckets;
pub use bucket_store::RollupStore;
pub use layered::{build_daily, build_monthly, build_weekly, combine_children};
pub use rolling::{RollingWindow, RollingWindows};
pub use scheduler::{RebuildReport, RollupScheduler, SchedulerHandle, SchedulerLoop};
pub use stats::AmountStats;
