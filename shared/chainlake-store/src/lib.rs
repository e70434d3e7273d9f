//! Chainlake storage layer.
//!
//! Two pieces of authoritative state live here: the versioned transfer
//! event store (append log + last-writer-wins index) and the partition
//! tracker that records ingestion completeness per block-height range.
//! Everything derived (rollups, profiles) is rebuildable from this crate.

pub mod compaction;
pub mod event_store;
pub mod partitions;

pub use event_store::{EventStore, StoreStats, UpsertReport};
pub use partitions::PartitionTracker;
