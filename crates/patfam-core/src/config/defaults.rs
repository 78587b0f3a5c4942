//! Default values for all tunable configuration.

/// Backoff base delay (milliseconds) for the first retry.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Cap on the exponential backoff delay (milliseconds).
pub const DEFAULT_MAX_DELAY_MS: u64 = 300_000;

/// Attempts before a job with only transient failures dead-letters.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Bounded worker count per crawl source.
pub const DEFAULT_WORKERS_PER_SOURCE: usize = 2;

/// Orchestrator poll interval when the queue is empty (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Minimum inventor-set Jaccard similarity for a fuzzy match.
pub const DEFAULT_MIN_INVENTOR_JACCARD: f64 = 0.6;

/// Filing-date proximity window for a fuzzy match (days).
pub const DEFAULT_FILING_WINDOW_DAYS: i64 = 365;

/// Minimum combined fuzzy score to join an existing family.
pub const DEFAULT_MIN_FUZZY_SCORE: f64 = 0.7;

/// Statutory patent term when no jurisdiction override applies (years).
pub const DEFAULT_TERM_YEARS: u32 = 20;

/// NearCliff lookahead window (months).
pub const DEFAULT_LOOKAHEAD_MONTHS: u32 = 24;
