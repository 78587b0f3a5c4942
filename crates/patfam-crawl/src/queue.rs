//! In-memory job queue implementing the `IJobQueue` contract.
//!
//! Stands in for the external durable broker in tests and single-process
//! deployments. At-least-once delivery: a job handed to a crashed worker
//! would be redelivered by a durable implementation, which ingest
//! idempotence absorbs.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use patfam_core::errors::PatfamResult;
use patfam_core::job::{CrawlJob, JobState};
use patfam_core::record::Source;
use patfam_core::traits::IJobQueue;

/// FIFO-per-source in-memory queue with eligibility timestamps and a
/// dead-letter list.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<Source, Vec<CrawlJob>>>,
    dead: Mutex<Vec<CrawlJob>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IJobQueue for MemoryQueue {
    fn enqueue(&self, job: CrawlJob) -> PatfamResult<()> {
        debug!(job_id = %job.id, source = %job.source, term = %job.query.term, "enqueue");
        let mut queues = self.queues.lock().expect("queue lock");
        queues.entry(job.source).or_default().push(job);
        Ok(())
    }

    fn dequeue(&self, source: Source, now: DateTime<Utc>) -> PatfamResult<Option<CrawlJob>> {
        let mut queues = self.queues.lock().expect("queue lock");
        let Some(jobs) = queues.get_mut(&source) else {
            return Ok(None);
        };
        // Oldest eligible job first.
        let pos = jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.next_eligible_at <= now)
            .min_by_key(|(_, j)| j.next_eligible_at)
            .map(|(i, _)| i);
        Ok(pos.map(|i| jobs.remove(i)))
    }

    fn reschedule(&self, job: CrawlJob, delay: Duration) -> PatfamResult<()> {
        debug!(
            job_id = %job.id,
            attempt = job.attempt_count,
            delay_ms = delay.num_milliseconds(),
            "reschedule with backoff"
        );
        let mut queues = self.queues.lock().expect("queue lock");
        queues.entry(job.source).or_default().push(job);
        Ok(())
    }

    fn dead_letter(&self, job: CrawlJob) -> PatfamResult<()> {
        warn!(
            job_id = %job.id,
            source = %job.source,
            term = %job.query.term,
            attempts = job.attempt_count,
            reason = job.failure_reason.as_deref().unwrap_or("unknown"),
            "job dead-lettered"
        );
        self.dead.lock().expect("dead-letter lock").push(job);
        Ok(())
    }

    fn cancel(&self, job_id: &str) -> PatfamResult<bool> {
        let mut queues = self.queues.lock().expect("queue lock");
        for jobs in queues.values_mut() {
            if let Some(pos) = jobs.iter().position(|j| j.id == job_id) {
                let mut job = jobs.remove(pos);
                job.state = JobState::Cancelled;
                debug!(job_id = %job.id, "job cancelled before start");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn depth(&self, source: Source) -> usize {
        self.queues
            .lock()
            .expect("queue lock")
            .get(&source)
            .map_or(0, Vec::len)
    }

    fn dead_letter_count(&self) -> usize {
        self.dead.lock().expect("dead-letter lock").len()
    }

    fn dead_letters(&self) -> Vec<CrawlJob> {
        self.dead.lock().expect("dead-letter lock").clone()
    }
}
