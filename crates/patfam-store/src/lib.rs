//! # patfam-store
//!
//! Durable SQLite layer for resolved families: WAL connection pool with
//! a single writer, sequential migrations, the idempotent materializer
//! with optimistic version checking, and lineage/cliff persistence.

pub mod engine;
pub mod materializer;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::{StoreEngine, StoreHealth};
pub use materializer::materialize;

use patfam_core::errors::{PatfamError, StoreError};

/// Wrap a low-level database failure into the workspace error type.
pub fn to_store_err(message: impl Into<String>) -> PatfamError {
    PatfamError::Store(StoreError::Sqlite {
        message: message.into(),
    })
}
