//! Block source seam.
//!
//! The node/RPC client lives outside the core; the pipeline only depends
//! on this trait.

use async_trait::async_trait;

use chainlake_common::types::Block;
use chainlake_common::Result;

/// Supplier of raw blocks by height range.
///
/// Implementations wrap a node RPC client. Errors that should be retried
/// must map to `ChainlakeError::Transient`; everything else is treated
/// as permanent for the attempted range.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch blocks for the half-open range `[start, end)`, in height
    /// order. A block missing from the response is treated as a hole by
    /// the caller's accounting, not an error.
    async fn get_blocks_by_height_range(&self, start: u64, end: u64) -> Result<Vec<Block>>;
}
