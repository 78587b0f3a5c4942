use serde::{Deserialize, Serialize};

use super::defaults;

/// Crawl orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Base delay for the first retry (milliseconds).
    pub base_delay_ms: u64,
    /// Cap on the backoff delay (milliseconds).
    pub max_delay_ms: u64,
    /// Attempts before a job dead-letters.
    pub max_attempts: u32,
    /// Bounded worker count per source; one slow source cannot starve
    /// the others.
    pub workers_per_source: usize,
    /// Poll interval when no job is eligible (milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: defaults::DEFAULT_BASE_DELAY_MS,
            max_delay_ms: defaults::DEFAULT_MAX_DELAY_MS,
            max_attempts: defaults::DEFAULT_MAX_ATTEMPTS,
            workers_per_source: defaults::DEFAULT_WORKERS_PER_SOURCE,
            poll_interval_ms: defaults::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}
