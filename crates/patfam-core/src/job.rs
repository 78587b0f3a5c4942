//! Crawl job model: the unit of scheduling owned by the orchestrator.
//!
//! Downstream components never reference jobs; records flow onward on
//! their own.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Source;

/// A query to run against one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrawlQuery {
    /// Search term as the source expects it.
    pub term: String,
    /// Attribution label (which strategy produced this query).
    pub label: String,
    /// Only return filings on or after this date. Sources that cannot
    /// filter server-side fetch everything and the crawler filters.
    pub filed_after: Option<NaiveDate>,
}

impl CrawlQuery {
    pub fn new(term: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            label: label.into(),
            filed_after: None,
        }
    }

    pub fn filed_after(mut self, date: NaiveDate) -> Self {
        self.filed_after = Some(date);
        self
    }

    /// Dedup key for at-most-one-in-flight semantics. The date window is
    /// part of the key: the same term with and without a window are
    /// distinct fetches.
    pub fn query_key(&self) -> String {
        match self.filed_after {
            Some(date) => format!("{}@{date}", self.term.to_lowercase()),
            None => self.term.to_lowercase(),
        }
    }
}

/// Lifecycle state of a crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for eligibility (fresh, or backing off after a failure).
    Queued,
    /// Handed to a worker; the crawler call is in flight.
    Running,
    /// Completed; records (possibly zero) were forwarded.
    Completed,
    /// Terminal failure; requires operator attention.
    DeadLetter,
    /// Removed from the queue before it started.
    Cancelled,
}

/// Unit of scheduling: one (source, query) fetch with retry state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: String,
    pub source: Source,
    pub query: CrawlQuery,
    pub state: JobState,
    /// Failed attempts so far.
    pub attempt_count: u32,
    /// Earliest instant the job may be dequeued.
    pub next_eligible_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    /// Reason recorded when the job dead-letters.
    pub failure_reason: Option<String>,
}

impl CrawlJob {
    /// Dedup key: same (source, query_key) must not run twice concurrently.
    pub fn inflight_key(&self) -> (Source, String) {
        (self.source, self.query.query_key())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            JobState::Completed | JobState::DeadLetter | JobState::Cancelled
        )
    }
}
