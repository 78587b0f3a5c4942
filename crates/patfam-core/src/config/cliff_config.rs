use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Cliff calculator configuration.
///
/// The rule set is documented and extensible, not an exhaustive legal
/// database: jurisdictions without an override use the default term.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliffConfig {
    /// Statutory term in years when no override applies.
    pub default_term_years: u32,
    /// Per-jurisdiction term overrides (years). Key is the jurisdiction code.
    pub term_overrides: HashMap<String, u32>,
    /// Supplementary-protection-certificate extension days per
    /// jurisdiction, applied to granted families only.
    pub spc_days: HashMap<String, i64>,
    /// NearCliff lookahead window (months).
    pub lookahead_months: u32,
}

impl Default for CliffConfig {
    fn default() -> Self {
        Self {
            default_term_years: defaults::DEFAULT_TERM_YEARS,
            term_overrides: HashMap::new(),
            spc_days: HashMap::new(),
            lookahead_months: defaults::DEFAULT_LOOKAHEAD_MONTHS,
        }
    }
}

impl CliffConfig {
    /// Statutory term for a jurisdiction, in years.
    pub fn term_years(&self, jurisdiction: &str) -> u32 {
        self.term_overrides
            .get(jurisdiction)
            .copied()
            .unwrap_or(self.default_term_years)
    }
}
