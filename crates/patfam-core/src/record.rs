//! The normalized record contract and the canonical (merged) record.
//!
//! Every crawler collaborator emits `RawRecord`s in this fixed schema;
//! the core never sees source-specific shapes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::IngestError;

/// Originating system of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Commercial patent search aggregator.
    Aggregator,
    /// National patent office.
    NationalOffice,
    /// International patent office (WIPO-style).
    IntlOffice,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Aggregator, Source::NationalOffice, Source::IntlOffice];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Aggregator => "aggregator",
            Source::NationalOffice => "national_office",
            Source::IntlOffice => "intl_office",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal status of a patent document as reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalStatus {
    Pending,
    Granted,
    Lapsed,
    Revoked,
    Expired,
    #[default]
    Unknown,
}

/// Identity of a raw record: one source's view of one publication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub source: Source,
    pub publication_number: String,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.publication_number)
    }
}

/// One source's view of one patent document. Immutable once ingested.
///
/// Publication and priority numbers are expected to be normalized
/// (uppercase, separators stripped) at the crawler boundary; `validate`
/// enforces the invariants the pipeline relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: Source,
    /// Two-letter jurisdiction code (e.g. "US", "BR", "WO").
    pub jurisdiction: String,
    pub application_number: String,
    pub publication_number: String,
    /// Priority numbers — the canonical cross-jurisdiction family link.
    pub priority_numbers: BTreeSet<String>,
    pub title: String,
    /// Ordered as reported by the source.
    pub inventors: Vec<String>,
    pub filing_date: NaiveDate,
    pub grant_date: Option<NaiveDate>,
    pub legal_status: LegalStatus,
    /// Family grouping already reported by the source, if any.
    pub family_hint_id: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl RawRecord {
    /// The record's identity: (source, publication_number).
    pub fn key(&self) -> RecordKey {
        RecordKey {
            source: self.source,
            publication_number: self.publication_number.clone(),
        }
    }

    /// Boundary validation. Rejecting one record never affects others.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), IngestError> {
        let reject = |field: &str, reason: &str| IngestError::MalformedRecord {
            key: format!("{}/{}", self.source, self.publication_number),
            field: field.to_string(),
            reason: reason.to_string(),
        };
        if self.publication_number.trim().is_empty() {
            return Err(reject("publication_number", "empty"));
        }
        if self.title.trim().is_empty() {
            return Err(reject("title", "empty"));
        }
        if self.jurisdiction.trim().is_empty() {
            return Err(reject("jurisdiction", "empty"));
        }
        if self.filing_date > now.date_naive() {
            return Err(reject("filing_date", "in the future"));
        }
        if let Some(granted) = self.grant_date {
            if granted < self.filing_date {
                return Err(reject("grant_date", "before filing date"));
            }
        }
        Ok(())
    }
}

/// A disagreement among acceptable sources for one canonical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub source: Source,
    /// Display form of the losing value, kept for audit.
    pub value: String,
}

/// Which source won a canonical field, plus the values it beat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub winner: Source,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<FieldConflict>,
}

/// The merge engine's output: one reconciled value per field.
///
/// Every value traces to at least one contributing member record; the
/// `provenance` map records the winning source and any conflicting
/// alternatives per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: String,
    pub application_number: String,
    /// Representative publication number (highest-ranked member's).
    pub publication_number: String,
    pub jurisdictions: BTreeSet<String>,
    pub priority_numbers: BTreeSet<String>,
    pub inventors: Vec<String>,
    /// Earliest filing date across members.
    pub filing_date: NaiveDate,
    pub grant_date: Option<NaiveDate>,
    pub legal_status: LegalStatus,
    /// Per-field winner + conflicting alternatives, keyed by field name.
    pub provenance: BTreeMap<String, FieldProvenance>,
}

impl CanonicalRecord {
    /// blake3 hash of the reconciled values (provenance excluded), used
    /// by the materializer for change detection.
    pub fn content_hash(&self) -> String {
        let fields = (
            &self.title,
            &self.application_number,
            &self.publication_number,
            &self.jurisdictions,
            &self.priority_numbers,
            &self.inventors,
            &self.filing_date,
            &self.grant_date,
            &self.legal_status,
        );
        let serialized = serde_json::to_string(&fields).unwrap_or_default();
        blake3::hash(serialized.as_bytes()).to_hex().to_string()
    }

    /// Structural diff: names of reconciled fields whose values differ.
    /// Provenance-only changes do not count as a content change.
    pub fn changed_fields(&self, other: &CanonicalRecord) -> Vec<String> {
        let mut changed = Vec::new();
        if self.title != other.title {
            changed.push("title".to_string());
        }
        if self.application_number != other.application_number {
            changed.push("application_number".to_string());
        }
        if self.publication_number != other.publication_number {
            changed.push("publication_number".to_string());
        }
        if self.jurisdictions != other.jurisdictions {
            changed.push("jurisdictions".to_string());
        }
        if self.priority_numbers != other.priority_numbers {
            changed.push("priority_numbers".to_string());
        }
        if self.inventors != other.inventors {
            changed.push("inventors".to_string());
        }
        if self.filing_date != other.filing_date {
            changed.push("filing_date".to_string());
        }
        if self.grant_date != other.grant_date {
            changed.push("grant_date".to_string());
        }
        if self.legal_status != other.legal_status {
            changed.push("legal_status".to_string());
        }
        changed
    }
}
