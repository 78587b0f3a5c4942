//! # patfam-resolver
//!
//! Clusters normalized records into patent families with a
//! deterministic, order-independent algorithm: priority-number
//! union-find first, source family hints second, fuzzy matching as the
//! last resort for records with no priority linkage at all.

pub mod fuzzy;
pub mod index;
pub mod resolver;

pub use fuzzy::FuzzyMatcher;
pub use index::LinkageIndex;
pub use resolver::{FamilyResolver, IngestOutcome};
