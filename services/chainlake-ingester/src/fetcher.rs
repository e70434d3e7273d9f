//! Block fetching with timeout and bounded exponential backoff.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use chainlake_common::config::RetryConfig;
use chainlake_common::types::Block;
use chainlake_common::{ChainlakeError, Result};

use crate::source::BlockSource;

/// Wraps a `BlockSource` with per-call timeouts and retry.
pub struct BlockFetcher {
    source: Arc<dyn BlockSource>,
    retry: RetryConfig,
    fetch_timeout: Duration,
}

impl BlockFetcher {
    pub fn new(source: Arc<dyn BlockSource>, retry: RetryConfig, fetch_timeout: Duration) -> Self {
        Self {
            source,
            retry,
            fetch_timeout,
        }
    }

    /// Fetch `[start, end)` with bounded retries. Returns the last error
    /// once attempts are exhausted; the caller records the hole and
    /// moves on.
    pub async fn fetch_range(&self, start: u64, end: u64) -> Result<Vec<Block>> {
        let mut attempts = 0;
        let mut last_error =
            ChainlakeError::Transient(format!("no attempt made for [{}, {})", start, end));

        while attempts < self.retry.max_attempts {
            attempts += 1;
            debug!(
                start,
                end, attempts, "Fetching block range (attempt {}/{})", attempts, self.retry.max_attempts
            );

            let call = self.source.get_blocks_by_height_range(start, end);
            match timeout(self.fetch_timeout, call).await {
                Ok(Ok(blocks)) => return Ok(blocks),
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => {
                    warn!(start, end, "Fetch attempt {} failed: {}", attempts, e);
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        start,
                        end,
                        timeout_secs = self.fetch_timeout.as_secs(),
                        "Fetch attempt {} timed out",
                        attempts
                    );
                    last_error = ChainlakeError::Transient(format!(
                        "fetch of [{}, {}) timed out after {:?}",
                        start, end, self.fetch_timeout
                    ));
                }
            }

            if attempts < self.retry.max_attempts {
                let delay = calculate_backoff(attempts, &self.retry);
                debug!("Waiting {}ms before retry", delay);
                sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(last_error)
    }
}

/// Exponential backoff delay with optional ±25% jitter, capped at the
/// configured maximum.
pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> u64 {
    let base_delay = config.initial_delay_ms as f64;
    let exponential = config.exponential_base.powi(attempt as i32 - 1);
    let mut delay = (base_delay * exponential) as u64;

    delay = delay.min(config.max_delay_ms);

    if config.jitter {
        let mut rng = rand::thread_rng();
        let jitter_factor = rng.gen_range(0.75..1.25);
        delay = (delay as f64 * jitter_factor) as u64;
    }

    delay
}
