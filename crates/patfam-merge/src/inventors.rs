//! Inventor list merging: union in first-seen rank order, de-duplicated
//! under case/diacritic-insensitive equality so "José García" and
//! "Jose Garcia" collapse to one entry.

use std::collections::BTreeSet;

use patfam_core::normalize::fold_text;
use patfam_core::record::RawRecord;

/// Union inventors across members. `members` must already be in
/// rank-then-key order; the first variant of a name seen wins its spot
/// and its spelling.
pub fn union_inventors(members: &[&RawRecord]) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::new();
    for member in members {
        for inventor in &member.inventors {
            let folded = fold_text(inventor);
            if folded.is_empty() {
                continue;
            }
            if seen.insert(folded) {
                out.push(inventor.clone());
            }
        }
    }
    out
}
