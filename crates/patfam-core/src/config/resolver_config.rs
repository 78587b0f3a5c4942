use serde::{Deserialize, Serialize};

use super::defaults;

/// Family resolver configuration. The fuzzy thresholds are policy, not
/// derivable constants; they are tunable with the matching order as the
/// contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum inventor-set Jaccard similarity for the fuzzy fallback.
    pub min_inventor_jaccard: f64,
    /// Maximum filing-date distance for the fuzzy fallback (days).
    pub filing_window_days: i64,
    /// Minimum combined score to join an existing family.
    pub min_score: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_inventor_jaccard: defaults::DEFAULT_MIN_INVENTOR_JACCARD,
            filing_window_days: defaults::DEFAULT_FILING_WINDOW_DAYS,
            min_score: defaults::DEFAULT_MIN_FUZZY_SCORE,
        }
    }
}
