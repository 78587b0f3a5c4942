//! Derived expiry facts: base term, named adjustments, effective expiry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::family::FamilyId;

/// Classification of a family relative to its effective expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CliffStatus {
    Active,
    /// Within the configured lookahead window of expiry.
    NearCliff,
    Expired,
}

/// One named term adjustment, as a signed day count.
///
/// The rule name makes the final expiry traceable to the exact sequence
/// of adjustments that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub rule: String,
    pub days: i64,
}

/// A cliff computation for one family at one reference date.
///
/// Recomputed, never mutated: each computation appends a new fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliffFact {
    pub family_id: FamilyId,
    /// Filing/priority date + statutory term, before adjustments.
    pub base_term_end: NaiveDate,
    /// Applied in fixed rule order.
    pub adjustments: Vec<Adjustment>,
    pub effective_expiry: NaiveDate,
    pub status: CliffStatus,
    /// Reference date the status was classified against.
    pub as_of: NaiveDate,
    pub computed_at: DateTime<Utc>,
}
