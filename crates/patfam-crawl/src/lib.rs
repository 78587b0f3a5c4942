//! # patfam-crawl
//!
//! Crawl orchestration: schedules and supervises fetch jobs per
//! (source, query) key, owns the retry/backoff policy, and forwards
//! fetched records to the resolver's ingest entry point.

pub mod backoff;
pub mod orchestrator;
pub mod queue;
pub mod status;
pub mod strategies;

pub use backoff::{RetryAction, RetryPolicy};
pub use orchestrator::{JobHandle, Orchestrator};
pub use queue::MemoryQueue;
pub use status::{SourceStatus, StatusBoard};
pub use strategies::{SearchSpec, Strategy};
