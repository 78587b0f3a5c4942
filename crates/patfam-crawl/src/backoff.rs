//! Pure retry/backoff state machine. No clocks, no sleeping: callers
//! pass the current attempt state in and get the next action out.

use chrono::Duration;

use patfam_core::config::CrawlConfig;
use patfam_core::errors::CrawlError;
use patfam_core::job::CrawlJob;

/// What the orchestrator should do with a failed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryAction {
    /// Put the job back with this backoff delay.
    Reschedule(Duration),
    /// Terminal: move to dead-letter and report.
    DeadLetter,
}

/// Exponential backoff with a cap and deterministic jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(config: &CrawlConfig) -> Self {
        Self {
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            max_attempts: config.max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide the next action after a failure. `job.attempt_count` must
    /// already include the failed attempt.
    pub fn next_action(&self, job: &CrawlJob, error: &CrawlError) -> RetryAction {
        if !error.is_retryable() {
            return RetryAction::DeadLetter;
        }
        if job.attempt_count >= self.max_attempts {
            return RetryAction::DeadLetter;
        }
        RetryAction::Reschedule(self.delay_for(&job.id, job.attempt_count))
    }

    /// Backoff delay for a given attempt: `base * 2^(attempt-1)`, capped,
    /// plus 0–25% jitter derived from the job id so the schedule is
    /// reproducible under test while real workers still de-synchronize.
    pub fn delay_for(&self, job_id: &str, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let raw = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        let jitter = raw / 4 * jitter_fraction(job_id, attempt) / u64::from(u8::MAX);
        Duration::milliseconds((raw + jitter) as i64)
    }
}

/// Deterministic jitter seed in 0..=255 from (job_id, attempt).
fn jitter_fraction(job_id: &str, attempt: u32) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(job_id.as_bytes());
    hasher.update(&attempt.to_le_bytes());
    u64::from(hasher.finalize().as_bytes()[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use patfam_core::job::{CrawlQuery, JobState};
    use patfam_core::record::Source;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(&CrawlConfig {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: 3,
            ..CrawlConfig::default()
        })
    }

    fn job(attempts: u32) -> CrawlJob {
        CrawlJob {
            id: "job-1".to_string(),
            source: Source::Aggregator,
            query: CrawlQuery::new("darolutamide", "primary"),
            state: JobState::Queued,
            attempt_count: attempts,
            next_eligible_at: Utc::now(),
            submitted_at: Utc::now(),
            failure_reason: None,
        }
    }

    #[test]
    fn transient_failures_reschedule_until_exhausted() {
        let p = policy();
        let err = CrawlError::transient("timeout");
        assert!(matches!(p.next_action(&job(1), &err), RetryAction::Reschedule(_)));
        assert!(matches!(p.next_action(&job(2), &err), RetryAction::Reschedule(_)));
        assert_eq!(p.next_action(&job(3), &err), RetryAction::DeadLetter);
    }

    #[test]
    fn permanent_failure_dead_letters_immediately() {
        let p = policy();
        let err = CrawlError::permanent("malformed query");
        assert_eq!(p.next_action(&job(1), &err), RetryAction::DeadLetter);
    }

    #[test]
    fn delay_doubles_and_caps() {
        let p = policy();
        let d1 = p.delay_for("job-1", 1).num_milliseconds();
        let d2 = p.delay_for("job-1", 2).num_milliseconds();
        let d9 = p.delay_for("job-1", 9).num_milliseconds();
        // Base 1s and 2s before jitter; jitter adds at most 25%.
        assert!((1_000..=1_250).contains(&d1));
        assert!((2_000..=2_500).contains(&d2));
        // 2^8 s would be 256s; capped at 60s + jitter.
        assert!((60_000..=75_000).contains(&d9));
    }

    #[test]
    fn jitter_is_deterministic_per_job_and_attempt() {
        let p = policy();
        assert_eq!(p.delay_for("job-1", 2), p.delay_for("job-1", 2));
    }
}
