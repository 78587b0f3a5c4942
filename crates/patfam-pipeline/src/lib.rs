//! # patfam-pipeline
//!
//! Composes the pipeline behind the orchestrator's record sink: ingest
//! into the resolver, re-merge on membership change, materialize with
//! version-race retry, then derive and persist the cliff fact. One
//! mutual-exclusion scope per family; disjoint families proceed in
//! parallel.

pub mod pipeline;

pub use pipeline::{Pipeline, ProcessOutcome};
