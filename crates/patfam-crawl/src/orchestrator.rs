//! The crawl orchestrator: per-source bounded workers, at-most-one-in-
//! flight per (source, query) key, retry with backoff, dead-letter
//! reporting, and record forwarding to the resolver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use patfam_core::config::CrawlConfig;
use patfam_core::errors::{CrawlError, PatfamError, PatfamResult};
use patfam_core::job::{CrawlJob, CrawlQuery, JobState};
use patfam_core::record::Source;
use patfam_core::traits::{IClock, ICrawler, IJobQueue, IRecordSink};

use crate::backoff::{RetryAction, RetryPolicy};
use crate::status::StatusBoard;
use crate::strategies::SearchSpec;

/// Handle returned by `submit`. Re-submitting a duplicate (source,
/// query) returns the existing job's handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub source: Source,
    pub query_key: String,
}

/// Schedules and supervises fetch jobs. Owns the retry state machine;
/// everything downstream of a fetched record belongs to the resolver.
pub struct Orchestrator {
    crawlers: HashMap<Source, Arc<dyn ICrawler>>,
    queue: Arc<dyn IJobQueue>,
    sink: Arc<dyn IRecordSink>,
    clock: Arc<dyn IClock>,
    policy: RetryPolicy,
    config: CrawlConfig,
    /// (source, query_key) -> handle for every non-terminal job.
    inflight: DashMap<(Source, String), JobHandle>,
    status: Arc<StatusBoard>,
    shutdown: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        queue: Arc<dyn IJobQueue>,
        sink: Arc<dyn IRecordSink>,
        clock: Arc<dyn IClock>,
        config: CrawlConfig,
    ) -> Self {
        Self {
            crawlers: HashMap::new(),
            queue,
            sink,
            clock,
            policy: RetryPolicy::new(&config),
            config,
            inflight: DashMap::new(),
            status: Arc::new(StatusBoard::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register the crawler collaborator for a source.
    pub fn register_crawler(&mut self, crawler: Arc<dyn ICrawler>) {
        self.crawlers.insert(crawler.source(), crawler);
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn queue(&self) -> &Arc<dyn IJobQueue> {
        &self.queue
    }

    /// Enqueue a fetch job. Submitting a (source, query) that is already
    /// queued or running is a no-op merge returning the existing handle.
    pub fn submit(&self, source: Source, query: CrawlQuery) -> PatfamResult<JobHandle> {
        let key = (source, query.query_key());
        if let Some(existing) = self.inflight.get(&key) {
            debug!(source = %source, term = %query.term, "duplicate submit coalesced");
            return Ok(existing.clone());
        }

        let now = self.clock.now();
        let job = CrawlJob {
            id: Uuid::new_v4().to_string(),
            source,
            query,
            state: JobState::Queued,
            attempt_count: 0,
            next_eligible_at: now,
            submitted_at: now,
            failure_reason: None,
        };
        let handle = JobHandle {
            job_id: job.id.clone(),
            source,
            query_key: key.1.clone(),
        };
        self.inflight.insert(key, handle.clone());
        self.queue.enqueue(job)?;
        Ok(handle)
    }

    /// Expand a search into its strategy query set and submit one job
    /// per (registered source, query).
    pub fn submit_search(&self, spec: &SearchSpec) -> PatfamResult<Vec<JobHandle>> {
        let queries = spec.expand(self.clock.now().date_naive());
        info!(
            compound = %spec.compound,
            queries = queries.len(),
            sources = self.crawlers.len(),
            "search submitted"
        );
        let mut sources: Vec<Source> = self.crawlers.keys().copied().collect();
        sources.sort();
        let mut handles = Vec::new();
        for source in sources {
            for query in &queries {
                handles.push(self.submit(source, query.clone())?);
            }
        }
        Ok(handles)
    }

    /// Cancel a job before it starts. In-flight crawler calls run to
    /// completion; only queued jobs can be removed.
    pub fn cancel(&self, handle: &JobHandle) -> PatfamResult<bool> {
        let removed = self.queue.cancel(&handle.job_id)?;
        if removed {
            self.inflight
                .remove(&(handle.source, handle.query_key.clone()));
        }
        Ok(removed)
    }

    /// Process at most one eligible job for a source. Returns whether a
    /// job was processed. This is the whole per-job state machine; the
    /// async workers are a thin driver around it.
    pub fn run_once(&self, source: Source) -> PatfamResult<bool> {
        let now = self.clock.now();
        let Some(mut job) = self.queue.dequeue(source, now)? else {
            return Ok(false);
        };
        job.state = JobState::Running;
        self.status.job_started(source);

        let Some(crawler) = self.crawlers.get(&source) else {
            job.state = JobState::DeadLetter;
            job.failure_reason = Some(format!("no crawler registered for {source}"));
            self.finish(job, true)?;
            return Err(PatfamError::Crawl(CrawlError::UnknownSource {
                name: source.to_string(),
            }));
        };

        match crawler.fetch(&job.query) {
            Ok(records) => {
                let mut accepted = 0usize;
                for record in records {
                    match self.sink.accept(record) {
                        Ok(()) => accepted += 1,
                        // A rejected record never affects its siblings,
                        // and the rejection is observable in the log.
                        Err(PatfamError::Ingest(e)) => {
                            warn!(job_id = %job.id, error = %e, "record rejected at ingest");
                        }
                        Err(e) => {
                            error!(job_id = %job.id, error = %e, "sink failure");
                            return Err(e);
                        }
                    }
                }
                debug!(job_id = %job.id, source = %source, accepted, "job completed");
                job.state = JobState::Completed;
                self.status.job_completed(source, accepted, self.clock.now());
                self.inflight.remove(&job.inflight_key());
                Ok(true)
            }
            Err(crawl_err) => {
                job.attempt_count += 1;
                match self.policy.next_action(&job, &crawl_err) {
                    RetryAction::Reschedule(delay) => {
                        job.state = JobState::Queued;
                        job.next_eligible_at = self.clock.now() + delay;
                        self.status.job_retrying(source);
                        self.queue.reschedule(job, delay)?;
                    }
                    RetryAction::DeadLetter => {
                        // Transient failures dead-letter as Exhausted so
                        // the reason records how many attempts were spent.
                        let final_err = if crawl_err.is_retryable() {
                            CrawlError::Exhausted {
                                attempts: job.attempt_count,
                                last_reason: crawl_err.to_string(),
                            }
                        } else {
                            crawl_err
                        };
                        job.state = JobState::DeadLetter;
                        job.failure_reason = Some(final_err.to_string());
                        self.finish(job, true)?;
                    }
                }
                Ok(true)
            }
        }
    }

    fn finish(&self, job: CrawlJob, dead: bool) -> PatfamResult<()> {
        self.inflight.remove(&job.inflight_key());
        if dead {
            self.status.job_dead_lettered(job.source);
            self.queue.dead_letter(job)?;
        }
        Ok(())
    }

    /// Process every currently eligible job across all sources. Returns
    /// the number processed. Jobs backing off stay queued.
    pub fn drain_eligible(&self) -> PatfamResult<usize> {
        let mut sources: Vec<Source> = self.crawlers.keys().copied().collect();
        sources.sort();
        let mut processed = 0;
        loop {
            let mut any = false;
            for &source in &sources {
                if self.run_once(source)? {
                    any = true;
                    processed += 1;
                }
            }
            if !any {
                return Ok(processed);
            }
        }
    }

    /// Request worker shutdown after their current job.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Spawn the bounded per-source worker tasks. Each source gets its
    /// own workers so one rate-limited source cannot starve the others.
    /// Crawler calls are synchronous, so each job step runs on the
    /// blocking pool and the task suspends until it returns.
    pub fn spawn_workers(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();
        let mut sources: Vec<Source> = self.crawlers.keys().copied().collect();
        sources.sort();
        for source in sources {
            for worker in 0..self.config.workers_per_source {
                let this = Arc::clone(self);
                handles.push(tokio::spawn(async move {
                    debug!(source = %source, worker, "worker started");
                    while !this.shutdown.load(Ordering::SeqCst) {
                        let step = {
                            let this = Arc::clone(&this);
                            tokio::task::spawn_blocking(move || this.run_once(source))
                        };
                        match step.await {
                            Ok(Ok(true)) => {}
                            Ok(Ok(false)) => {
                                tokio::time::sleep(std::time::Duration::from_millis(
                                    this.config.poll_interval_ms,
                                ))
                                .await;
                            }
                            Ok(Err(e)) => {
                                error!(source = %source, worker, error = %e, "worker error");
                            }
                            Err(e) => {
                                error!(source = %source, worker, error = %e, "worker panicked");
                            }
                        }
                    }
                    debug!(source = %source, worker, "worker stopped");
                }));
            }
        }
        handles
    }
}
