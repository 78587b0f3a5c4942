//! The cliff computation: base term, adjustment sequence, status.

use chrono::{DateTime, Months, NaiveDate, Utc};
use tracing::debug;

use patfam_core::cliff::{CliffFact, CliffStatus};
use patfam_core::config::CliffConfig;
use patfam_core::record::CanonicalRecord;

use crate::rules;

/// Pure cliff derivation over a canonical record. Re-runnable at any
/// reference date without touching the record.
#[derive(Debug, Clone)]
pub struct CliffCalculator {
    config: CliffConfig,
}

impl CliffCalculator {
    pub fn new(config: CliffConfig) -> Self {
        Self { config }
    }

    /// Compute the cliff fact for one family as of a reference date.
    ///
    /// Base term is the canonical (earliest) filing date plus the
    /// statutory term for the representative jurisdiction. Adjustments
    /// run in fixed order: prosecution delay, terminal disclaimer,
    /// supplementary protection.
    pub fn compute(
        &self,
        family_id: &str,
        canonical: &CanonicalRecord,
        as_of: NaiveDate,
        computed_at: DateTime<Utc>,
    ) -> CliffFact {
        let jurisdiction = representative_jurisdiction(canonical);
        let term_years = self.config.term_years(&jurisdiction);
        let base_term_end = canonical
            .filing_date
            .checked_add_months(Months::new(12 * term_years))
            .unwrap_or(canonical.filing_date);

        let mut adjustments = Vec::new();
        let mut expiry = base_term_end;

        if let Some(adj) = rules::prosecution_delay(canonical) {
            expiry = expiry + chrono::Duration::days(adj.days);
            adjustments.push(adj);
        }
        if let Some(adj) = rules::terminal_disclaimer(canonical, expiry, as_of) {
            expiry = expiry + chrono::Duration::days(adj.days);
            adjustments.push(adj);
        }
        if let Some(adj) = rules::supplementary_protection(canonical, &jurisdiction, &self.config) {
            expiry = expiry + chrono::Duration::days(adj.days);
            adjustments.push(adj);
        }

        let status = self.classify(expiry, as_of);
        debug!(
            family_id,
            %jurisdiction,
            %base_term_end,
            %expiry,
            adjustments = adjustments.len(),
            "computed cliff"
        );
        CliffFact {
            family_id: family_id.to_string(),
            base_term_end,
            adjustments,
            effective_expiry: expiry,
            status,
            as_of,
            computed_at,
        }
    }

    fn classify(&self, expiry: NaiveDate, as_of: NaiveDate) -> CliffStatus {
        if expiry < as_of {
            return CliffStatus::Expired;
        }
        let horizon = as_of
            .checked_add_months(Months::new(self.config.lookahead_months))
            .unwrap_or(as_of);
        if expiry <= horizon {
            CliffStatus::NearCliff
        } else {
            CliffStatus::Active
        }
    }
}

/// The jurisdiction the term lookup keys on: the representative
/// publication number's alphabetic prefix, else the smallest member
/// jurisdiction.
fn representative_jurisdiction(canonical: &CanonicalRecord) -> String {
    let prefix: String = canonical
        .publication_number
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if !prefix.is_empty() {
        return prefix;
    }
    canonical
        .jurisdictions
        .iter()
        .next()
        .cloned()
        .unwrap_or_default()
}
