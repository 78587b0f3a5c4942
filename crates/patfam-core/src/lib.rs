//! # patfam-core
//!
//! Foundation crate for the patfam patent-family pipeline.
//! Defines the normalized record contract, family/canonical models,
//! errors, config, normalization helpers, and collaborator traits.
//! Every other crate in the workspace depends on this.

pub mod cliff;
pub mod config;
pub mod errors;
pub mod family;
pub mod job;
pub mod normalize;
pub mod record;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use cliff::{Adjustment, CliffFact, CliffStatus};
pub use config::PatfamConfig;
pub use errors::{PatfamError, PatfamResult};
pub use family::{Family, FamilyId};
pub use record::{CanonicalRecord, LegalStatus, RawRecord, RecordKey, Source};
