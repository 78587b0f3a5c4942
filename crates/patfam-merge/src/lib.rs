//! # patfam-merge
//!
//! The merge engine: a pure function from a family's member records to
//! one canonical record, with per-field source precedence and conflict
//! tracking. No external state; calling it twice with the same member
//! set yields a bit-identical result.

pub mod engine;
pub mod inventors;
pub mod precedence;

pub use engine::merge;
pub use precedence::PrecedenceTable;
