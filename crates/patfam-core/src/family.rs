//! The resolved family: one cluster of records describing one invention.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{CanonicalRecord, RecordKey};

/// Stable family identifier, deterministically derived from the
/// cluster's smallest linking key.
pub type FamilyId = String;

/// Derive a family id from a linking key (smallest priority number of
/// the cluster, or the smallest publication number when the cluster has
/// no priority linkage).
///
/// Deterministic by construction: two runs that cluster the same records
/// derive the same id regardless of arrival order.
pub fn derive_family_id(linking_key: &str) -> FamilyId {
    let digest = blake3::hash(linking_key.as_bytes()).to_hex();
    format!("fam-{}", &digest.as_str()[..16])
}

/// A resolved patent family.
///
/// Invariant: every record belongs to at most one family; membership only
/// grows, except when a late-arriving bridge record merges two families
/// (the absorbed family's members move under the surviving id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub family_id: FamilyId,
    pub member_keys: BTreeSet<RecordKey>,
    /// Source-declared family hints seen on members, for hint matching.
    pub hints: BTreeSet<String>,
    pub canonical: CanonicalRecord,
    /// Materialized version; 0 until first persisted.
    pub version: u64,
    pub resolved_at: DateTime<Utc>,
}

/// Result of an idempotent family upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializationResult {
    pub family_id: FamilyId,
    /// False when the stored canonical record was already identical.
    pub changed: bool,
    pub version: u64,
    pub changed_fields: Vec<String>,
}

/// One entry of a family's version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub version: u64,
    pub changed_fields: Vec<String>,
    pub at: DateTime<Utc>,
}
