//! # patfam-cliff
//!
//! Pure derivation of patent-cliff facts from a canonical record: base
//! statutory term, a fixed ordered sequence of named adjustments, and
//! status classification against a reference date.

pub mod calculator;
pub mod rules;

pub use calculator::CliffCalculator;
