//! Collaborator contracts. Site-specific crawlers, the job queue, and
//! the clock are injected behind these traits so the pipeline stays
//! deterministic and unit-testable.

use chrono::{DateTime, Duration, Utc};

use crate::errors::{CrawlError, PatfamResult};
use crate::job::{CrawlJob, CrawlQuery};
use crate::record::{RawRecord, Source};

/// A per-source crawler collaborator. Given a query, produces zero or
/// more normalized records, or fails with the retryable/non-retryable
/// distinction the orchestrator's retry policy keys on.
pub trait ICrawler: Send + Sync {
    fn source(&self) -> Source;
    fn fetch(&self, query: &CrawlQuery) -> Result<Vec<RawRecord>, CrawlError>;
}

/// Durable job queue contract. At-least-once delivery is assumed;
/// ingest idempotence absorbs redelivery.
pub trait IJobQueue: Send + Sync {
    fn enqueue(&self, job: CrawlJob) -> PatfamResult<()>;
    /// Next job for `source` whose `next_eligible_at` has passed, or None.
    fn dequeue(&self, source: Source, now: DateTime<Utc>) -> PatfamResult<Option<CrawlJob>>;
    /// Put a job back with a new eligibility time (backoff).
    fn reschedule(&self, job: CrawlJob, delay: Duration) -> PatfamResult<()>;
    /// Move a job to the terminal dead-letter state.
    fn dead_letter(&self, job: CrawlJob) -> PatfamResult<()>;
    /// Remove a queued job before it starts. Returns false if it was
    /// not queued (already running or terminal).
    fn cancel(&self, job_id: &str) -> PatfamResult<bool>;
    fn depth(&self, source: Source) -> usize;
    fn dead_letter_count(&self) -> usize;
    fn dead_letters(&self) -> Vec<CrawlJob>;
}

/// Where the orchestrator forwards successfully fetched records.
pub trait IRecordSink: Send + Sync {
    fn accept(&self, record: RawRecord) -> PatfamResult<()>;
}

/// Injected clock so the retry state machine is testable without real time.
pub trait IClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl IClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
