//! Health/status surface consumed by an external monitoring layer.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use patfam_core::record::Source;

/// Per-source operational counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceStatus {
    pub in_flight: usize,
    pub jobs_completed: u64,
    pub jobs_dead_lettered: u64,
    pub records_emitted: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_materialized_at: Option<DateTime<Utc>>,
}

/// Thread-safe status board, keyed by source.
#[derive(Debug, Default)]
pub struct StatusBoard {
    sources: DashMap<Source, SourceStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_started(&self, source: Source) {
        self.sources.entry(source).or_default().in_flight += 1;
    }

    pub fn job_completed(&self, source: Source, records: usize, at: DateTime<Utc>) {
        let mut entry = self.sources.entry(source).or_default();
        entry.in_flight = entry.in_flight.saturating_sub(1);
        entry.jobs_completed += 1;
        entry.records_emitted += records as u64;
        entry.last_success_at = Some(at);
    }

    pub fn job_retrying(&self, source: Source) {
        let mut entry = self.sources.entry(source).or_default();
        entry.in_flight = entry.in_flight.saturating_sub(1);
    }

    pub fn job_dead_lettered(&self, source: Source) {
        let mut entry = self.sources.entry(source).or_default();
        entry.in_flight = entry.in_flight.saturating_sub(1);
        entry.jobs_dead_lettered += 1;
    }

    pub fn materialized(&self, source: Source, at: DateTime<Utc>) {
        self.sources.entry(source).or_default().last_materialized_at = Some(at);
    }

    pub fn source(&self, source: Source) -> SourceStatus {
        self.sources
            .get(&source)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<(Source, SourceStatus)> {
        self.sources
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }
}
