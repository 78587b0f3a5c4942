//! Fuzzy fallback matching for records with no priority linkage:
//! normalized title, inventor-set overlap, filing-date proximity.

use std::collections::BTreeSet;

use patfam_core::config::ResolverConfig;
use patfam_core::normalize::{fold_text, folded_set, jaccard};
use patfam_core::record::{CanonicalRecord, RawRecord};

const TITLE_WEIGHT: f64 = 0.6;
const INVENTOR_WEIGHT: f64 = 0.25;
const DATE_WEIGHT: f64 = 0.15;

/// Scores a record against a family's canonical record.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    config: ResolverConfig,
}

impl FuzzyMatcher {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Combined similarity in [0, 1], or None when a hard gate fails
    /// (filing dates too far apart, or both inventor sets present but
    /// below the Jaccard threshold).
    ///
    /// The inventor component is skipped when either side has no
    /// inventors: sources frequently omit them, and absence must not
    /// veto a title + date match.
    pub fn score(&self, record: &RawRecord, canonical: &CanonicalRecord) -> Option<f64> {
        let date_distance = (record.filing_date - canonical.filing_date).num_days().abs();
        if date_distance > self.config.filing_window_days {
            return None;
        }

        let record_inventors = folded_set(&record.inventors);
        let canonical_inventors = folded_set(&canonical.inventors);
        let inventor_sim = if record_inventors.is_empty() || canonical_inventors.is_empty() {
            None
        } else {
            let sim = jaccard(&record_inventors, &canonical_inventors);
            if sim < self.config.min_inventor_jaccard {
                return None;
            }
            Some(sim)
        };

        let title_sim = title_similarity(&record.title, &canonical.title);
        let date_sim = 1.0 - date_distance as f64 / self.config.filing_window_days as f64;

        let mut weighted = TITLE_WEIGHT * title_sim + DATE_WEIGHT * date_sim;
        let mut total = TITLE_WEIGHT + DATE_WEIGHT;
        if let Some(sim) = inventor_sim {
            weighted += INVENTOR_WEIGHT * sim;
            total += INVENTOR_WEIGHT;
        }
        Some(weighted / total)
    }

    pub fn min_score(&self) -> f64 {
        self.config.min_score
    }
}

/// 1.0 for fold-equal titles, else Jaccard over folded title tokens.
fn title_similarity(a: &str, b: &str) -> f64 {
    let fold_a = fold_text(a);
    let fold_b = fold_text(b);
    if fold_a == fold_b {
        return 1.0;
    }
    let tokens_a: BTreeSet<String> = fold_a.split_whitespace().map(str::to_string).collect();
    let tokens_b: BTreeSet<String> = fold_b.split_whitespace().map(str::to_string).collect();
    jaccard(&tokens_a, &tokens_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::collections::BTreeMap;
    use patfam_core::record::{LegalStatus, Source};

    fn record(title: &str, inventors: &[&str], filing: NaiveDate) -> RawRecord {
        RawRecord {
            source: Source::IntlOffice,
            jurisdiction: "WO".to_string(),
            application_number: "A".to_string(),
            publication_number: "WO1".to_string(),
            priority_numbers: BTreeSet::new(),
            title: title.to_string(),
            inventors: inventors.iter().map(|s| s.to_string()).collect(),
            filing_date: filing,
            grant_date: None,
            legal_status: LegalStatus::Unknown,
            family_hint_id: None,
            fetched_at: Utc::now(),
        }
    }

    fn canonical(title: &str, inventors: &[&str], filing: NaiveDate) -> CanonicalRecord {
        CanonicalRecord {
            title: title.to_string(),
            application_number: "A".to_string(),
            publication_number: "US1".to_string(),
            jurisdictions: ["US".to_string()].into(),
            priority_numbers: BTreeSet::new(),
            inventors: inventors.iter().map(|s| s.to_string()).collect(),
            filing_date: filing,
            grant_date: None,
            legal_status: LegalStatus::Unknown,
            provenance: BTreeMap::new(),
        }
    }

    #[test]
    fn identical_title_and_close_dates_score_high() {
        let matcher = FuzzyMatcher::new(ResolverConfig::default());
        let filing = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let score = matcher
            .score(
                &record("Crystalline form", &[], filing + chrono::Duration::days(4)),
                &canonical("Crystalline FORM", &["Ann Lee"], filing),
            )
            .unwrap();
        assert!(score > 0.9, "score was {score}");
    }

    #[test]
    fn distant_filing_dates_fail_the_gate() {
        let matcher = FuzzyMatcher::new(ResolverConfig::default());
        let filing = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(matcher
            .score(
                &record("Crystalline form", &[], filing + chrono::Duration::days(800)),
                &canonical("Crystalline form", &[], filing),
            )
            .is_none());
    }

    #[test]
    fn low_inventor_overlap_fails_the_gate() {
        let matcher = FuzzyMatcher::new(ResolverConfig::default());
        let filing = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(matcher
            .score(
                &record("Crystalline form", &["X", "Y", "Z"], filing),
                &canonical("Crystalline form", &["A", "B", "C"], filing),
            )
            .is_none());
    }
}
