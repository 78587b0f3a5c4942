//! Query strategy expansion: one submitted search fans out into the
//! per-source query set that maximizes family coverage.
//!
//! Each query carries a strategy label so coverage can be attributed
//! per strategy after the fact.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use patfam_core::job::CrawlQuery;

/// Recent-window lookback. Aggregators lag national offices by months,
/// so recent filings need a dedicated date-filtered pass.
const RECENT_WINDOW_YEARS: i32 = 3;

/// Pharmaceutical IPC classes paired with an attribution label.
const CLASSIFICATION_CODES: [(&str, &str); 5] = [
    ("A61K", "medicaments"),
    ("A61P", "therapeutic_activity"),
    ("A61K9", "dosage_forms"),
    ("A61K31", "organic_compounds"),
    ("A61K47", "excipients"),
];

/// Formulation vocabulary appended to the compound term.
const FORMULATION_TERMS: [&str; 8] = [
    "tablet",
    "capsule",
    "injectable",
    "formulation",
    "pharmaceutical composition",
    "controlled release",
    "sustained release",
    "dosage form",
];

/// Derivative vocabulary: polymorphs, salts, and crystalline forms.
const DERIVATIVE_TERMS: [&str; 10] = [
    "polymorph",
    "crystalline form",
    "salt",
    "hydrate",
    "solvate",
    "anhydrous",
    "hydrochloride",
    "sulfate",
    "phosphate",
    "crystal",
];

/// The named strategies a search expands into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Primary,
    Brand,
    DevCode,
    Combined,
    Applicant,
    Classification,
    RecentWindow,
    Formulation,
    Derivative,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Primary => "primary",
            Strategy::Brand => "brand",
            Strategy::DevCode => "dev_code",
            Strategy::Combined => "combined",
            Strategy::Applicant => "applicant",
            Strategy::Classification => "classification",
            Strategy::RecentWindow => "recent_window",
            Strategy::Formulation => "formulation",
            Strategy::Derivative => "derivative",
        }
    }
}

/// What to search for: a compound plus the aliases that reach filings
/// the primary name misses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpec {
    /// Primary compound name.
    pub compound: String,
    /// Commercial brand name, if known.
    pub brand: Option<String>,
    /// Development codes (pre-approval identifiers). Capped at 5.
    pub dev_codes: Vec<String>,
    /// Known applicants/assignees. Capped at 10.
    pub applicants: Vec<String>,
}

impl SearchSpec {
    pub fn for_compound(compound: impl Into<String>) -> Self {
        Self {
            compound: compound.into(),
            ..Self::default()
        }
    }

    /// Expand into the full labeled query set. `today` anchors the
    /// recent-window strategy's date filter.
    pub fn expand(&self, today: NaiveDate) -> Vec<CrawlQuery> {
        let mut queries = Vec::new();
        let label = |strategy: Strategy, detail: &str| {
            if detail.is_empty() {
                strategy.as_str().to_string()
            } else {
                format!("{}_{}", strategy.as_str(), detail)
            }
        };

        queries.push(CrawlQuery::new(&self.compound, label(Strategy::Primary, "")));

        if let Some(brand) = &self.brand {
            queries.push(CrawlQuery::new(brand, label(Strategy::Brand, "")));
            queries.push(CrawlQuery::new(
                format!("{} {brand}", self.compound),
                label(Strategy::Combined, ""),
            ));
        }

        for (idx, code) in self.dev_codes.iter().take(5).enumerate() {
            queries.push(CrawlQuery::new(code, label(Strategy::DevCode, &(idx + 1).to_string())));
        }

        // Applicant terms are scoped with the compound to filter noise.
        for (idx, applicant) in self.applicants.iter().take(10).enumerate() {
            queries.push(CrawlQuery::new(
                format!("{applicant} {}", self.compound),
                label(Strategy::Applicant, &(idx + 1).to_string()),
            ));
        }

        for (code, detail) in CLASSIFICATION_CODES {
            queries.push(CrawlQuery::new(
                format!("{} {code}", self.compound),
                label(Strategy::Classification, detail),
            ));
        }

        let window_start = today
            .with_year(today.year() - RECENT_WINDOW_YEARS)
            .unwrap_or(today);
        queries.push(
            CrawlQuery::new(&self.compound, label(Strategy::RecentWindow, ""))
                .filed_after(window_start),
        );

        for (idx, term) in FORMULATION_TERMS.iter().enumerate() {
            queries.push(CrawlQuery::new(
                format!("{} {term}", self.compound),
                label(Strategy::Formulation, &(idx + 1).to_string()),
            ));
        }

        for (idx, term) in DERIVATIVE_TERMS.iter().enumerate() {
            queries.push(CrawlQuery::new(
                format!("{} {term}", self.compound),
                label(Strategy::Derivative, &(idx + 1).to_string()),
            ));
        }

        queries
    }
}
