//! The field-level merge. Pure: output depends only on the member set,
//! never on arrival order or external state.

use std::collections::{BTreeMap, BTreeSet};

use patfam_core::normalize::fold_text;
use patfam_core::record::{CanonicalRecord, FieldConflict, FieldProvenance, LegalStatus, RawRecord};

use crate::inventors::union_inventors;
use crate::precedence::PrecedenceTable;

/// Merge a family's member records into one canonical record.
///
/// Returns `None` only for an empty member set (a family always has at
/// least one member). Members are sorted by (precedence rank, record
/// key) before folding, which is what makes the result independent of
/// iteration order.
pub fn merge(members: &[RawRecord], table: &PrecedenceTable) -> Option<CanonicalRecord> {
    if members.is_empty() {
        return None;
    }

    // Deterministic processing order: precedence rank, then record key.
    let mut ordered: Vec<&RawRecord> = members.iter().collect();
    ordered.sort_by_key(|r| (PrecedenceTable::rank(&table.bibliographic, r.source), r.key()));

    let mut provenance = BTreeMap::new();

    let (title, title_prov) = pick_title(&ordered);
    provenance.insert("title".to_string(), title_prov);

    let representative = ordered[0];
    provenance.insert(
        "publication_number".to_string(),
        FieldProvenance {
            winner: representative.source,
            conflicts: Vec::new(),
        },
    );

    let (application_number, app_prov) = pick_application_number(&ordered);
    provenance.insert("application_number".to_string(), app_prov);

    let (filing_date, filing_prov) = pick_filing_date(&ordered);
    provenance.insert("filing_date".to_string(), filing_prov);

    let (grant_date, grant_prov) = pick_grant_date(&ordered, table);
    if let Some(prov) = grant_prov {
        provenance.insert("grant_date".to_string(), prov);
    }

    let (legal_status, status_prov) = pick_legal_status(&ordered, table);
    provenance.insert("legal_status".to_string(), status_prov);

    let jurisdictions: BTreeSet<String> = ordered
        .iter()
        .map(|r| r.jurisdiction.to_uppercase())
        .collect();
    let priority_numbers: BTreeSet<String> = ordered
        .iter()
        .flat_map(|r| r.priority_numbers.iter().cloned())
        .collect();

    Some(CanonicalRecord {
        title,
        application_number,
        publication_number: representative.publication_number.clone(),
        jurisdictions,
        priority_numbers,
        inventors: union_inventors(&ordered),
        filing_date,
        grant_date,
        legal_status,
        provenance,
    })
}

/// Any non-empty title is acceptable; prefer the longest (truncated
/// aggregator titles lose to full office titles). Ties go to the
/// highest-ranked source, which is first in the ordered slice.
fn pick_title(ordered: &[&RawRecord]) -> (String, FieldProvenance) {
    let mut winner: Option<&RawRecord> = None;
    for candidate in ordered.iter().copied() {
        if candidate.title.trim().is_empty() {
            continue;
        }
        match winner {
            Some(current) if candidate.title.chars().count() <= current.title.chars().count() => {}
            _ => winner = Some(candidate),
        }
    }
    // Validation guarantees at least one non-empty title.
    let winner = winner.unwrap_or(ordered[0]);
    let winning_fold = fold_text(&winner.title);
    let mut conflicts = Vec::new();
    let mut seen = BTreeSet::new();
    for r in ordered {
        let folded = fold_text(&r.title);
        if !r.title.trim().is_empty() && folded != winning_fold && seen.insert(folded) {
            conflicts.push(FieldConflict {
                source: r.source,
                value: r.title.clone(),
            });
        }
    }
    (
        winner.title.clone(),
        FieldProvenance {
            winner: winner.source,
            conflicts,
        },
    )
}

fn pick_application_number(ordered: &[&RawRecord]) -> (String, FieldProvenance) {
    let winner = ordered
        .iter()
        .find(|r| !r.application_number.trim().is_empty())
        .copied()
        .unwrap_or(ordered[0]);
    (
        winner.application_number.clone(),
        FieldProvenance {
            winner: winner.source,
            conflicts: Vec::new(),
        },
    )
}

/// Canonical filing date is the earliest across members: the family's
/// life starts at its first filing.
fn pick_filing_date(ordered: &[&RawRecord]) -> (chrono::NaiveDate, FieldProvenance) {
    let winner = ordered
        .iter()
        .min_by_key(|r| r.filing_date)
        .copied()
        .unwrap_or(ordered[0]);
    let mut conflicts = Vec::new();
    let mut seen = BTreeSet::new();
    for r in ordered {
        if r.filing_date != winner.filing_date && seen.insert(r.filing_date) {
            conflicts.push(FieldConflict {
                source: r.source,
                value: r.filing_date.to_string(),
            });
        }
    }
    (
        winner.filing_date,
        FieldProvenance {
            winner: winner.source,
            conflicts,
        },
    )
}

/// Exact consensus when every reporting member agrees; otherwise the
/// highest-ranked source wins, most recent fetch breaking ties.
fn pick_grant_date(
    ordered: &[&RawRecord],
    table: &PrecedenceTable,
) -> (Option<chrono::NaiveDate>, Option<FieldProvenance>) {
    let reporting: Vec<&RawRecord> = ordered
        .iter()
        .copied()
        .filter(|r| r.grant_date.is_some())
        .collect();
    let Some(&first) = reporting.first() else {
        return (None, None);
    };
    let consensus = reporting.iter().all(|r| r.grant_date == first.grant_date);
    let winner = if consensus {
        first
    } else {
        reporting
            .iter()
            .copied()
            .min_by(|a, b| {
                PrecedenceTable::rank(&table.dates, a.source)
                    .cmp(&PrecedenceTable::rank(&table.dates, b.source))
                    .then(b.fetched_at.cmp(&a.fetched_at))
            })
            .unwrap_or(first)
    };
    let mut conflicts = Vec::new();
    let mut seen = BTreeSet::new();
    for r in &reporting {
        if r.grant_date != winner.grant_date && seen.insert(r.grant_date) {
            conflicts.push(FieldConflict {
                source: r.source,
                value: r.grant_date.map(|d| d.to_string()).unwrap_or_default(),
            });
        }
    }
    (
        winner.grant_date,
        Some(FieldProvenance {
            winner: winner.source,
            conflicts,
        }),
    )
}

/// First source in the legal-status ranking that reports a known status
/// wins; disagreements from lower-ranked sources are recorded, never
/// fatal. All-unknown members yield `Unknown`.
fn pick_legal_status(
    ordered: &[&RawRecord],
    table: &PrecedenceTable,
) -> (LegalStatus, FieldProvenance) {
    let winner = ordered
        .iter()
        .filter(|r| r.legal_status != LegalStatus::Unknown)
        .min_by(|a, b| {
            PrecedenceTable::rank(&table.legal_status, a.source)
                .cmp(&PrecedenceTable::rank(&table.legal_status, b.source))
                .then(b.fetched_at.cmp(&a.fetched_at))
                .then(a.key().cmp(&b.key()))
        })
        .copied()
        .unwrap_or(ordered[0]);
    let mut conflicts = Vec::new();
    let mut seen = BTreeSet::new();
    for r in ordered {
        if r.legal_status != LegalStatus::Unknown
            && r.legal_status != winner.legal_status
            && seen.insert(format!("{:?}/{:?}", r.source, r.legal_status))
        {
            conflicts.push(FieldConflict {
                source: r.source,
                value: format!("{:?}", r.legal_status),
            });
        }
    }
    (
        winner.legal_status,
        FieldProvenance {
            winner: winner.source,
            conflicts,
        },
    )
}
