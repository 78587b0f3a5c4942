/// Crawl-side errors. The transient/permanent split drives the retry
/// policy: transient failures are rescheduled with backoff, permanent
/// failures go straight to the dead-letter state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CrawlError {
    #[error("transient source failure: {reason}")]
    Transient { reason: String },

    #[error("permanent source failure: {reason}")]
    Permanent { reason: String },

    #[error("retries exhausted after {attempts} attempts: {last_reason}")]
    Exhausted { attempts: u32, last_reason: String },

    // Field is deliberately not named `source`: thiserror reserves that
    // name for the error cause.
    #[error("no crawler registered for source {name}")]
    UnknownSource { name: String },
}

impl CrawlError {
    /// Whether this failure should be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CrawlError::Transient { .. })
    }

    pub fn transient(reason: impl std::fmt::Display) -> Self {
        Self::Transient {
            reason: reason.to_string(),
        }
    }

    pub fn permanent(reason: impl std::fmt::Display) -> Self {
        Self::Permanent {
            reason: reason.to_string(),
        }
    }
}
