//! Ranked source precedence per canonical field.

use serde::{Deserialize, Serialize};

use patfam_core::record::Source;

/// Ranked list of acceptable sources for each field. Lower index wins.
///
/// Defaults: legal facts come from the national office first (it is the
/// authority for its jurisdiction), then the international office, then
/// the commercial aggregator. Bibliographic fields accept any source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecedenceTable {
    pub legal_status: Vec<Source>,
    pub dates: Vec<Source>,
    pub bibliographic: Vec<Source>,
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        let authority_first = vec![Source::NationalOffice, Source::IntlOffice, Source::Aggregator];
        Self {
            legal_status: authority_first.clone(),
            dates: authority_first.clone(),
            bibliographic: authority_first,
        }
    }
}

impl PrecedenceTable {
    /// Rank of a source in a ranked list; unlisted sources sort last.
    pub fn rank(ranking: &[Source], source: Source) -> usize {
        ranking
            .iter()
            .position(|s| *s == source)
            .unwrap_or(ranking.len())
    }
}
