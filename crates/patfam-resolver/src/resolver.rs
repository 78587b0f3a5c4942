//! The family resolver: ingest entry point, matching cascade, and the
//! merge-of-families correction for late-arriving bridge records.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use patfam_core::config::ResolverConfig;
use patfam_core::errors::PatfamResult;
use patfam_core::family::{derive_family_id, Family, FamilyId};
use patfam_core::normalize::normalize_number;
use patfam_core::record::{RawRecord, RecordKey};
use patfam_merge::{merge, PrecedenceTable};

use crate::fuzzy::FuzzyMatcher;
use crate::index::LinkageIndex;

/// What an ingest did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub family_id: FamilyId,
    /// A new family was created for this record.
    pub created: bool,
    /// Families absorbed into `family_id` by this record's priority
    /// bridge, in absorbed-id order.
    pub merged_from: Vec<FamilyId>,
    /// False for the idempotent re-ingest no-op.
    pub changed: bool,
}

/// Owns all ingested records and the current clustering. All member
/// records are retained so any membership change can recompute the
/// canonical record from scratch.
pub struct FamilyResolver {
    matcher: FuzzyMatcher,
    table: PrecedenceTable,
    records: BTreeMap<RecordKey, RawRecord>,
    families: BTreeMap<FamilyId, Family>,
    index: LinkageIndex,
    /// Redirects from merged-away ids to their survivors.
    forward: BTreeMap<FamilyId, FamilyId>,
}

impl FamilyResolver {
    pub fn new(config: ResolverConfig, table: PrecedenceTable) -> Self {
        Self {
            matcher: FuzzyMatcher::new(config),
            table,
            records: BTreeMap::new(),
            families: BTreeMap::new(),
            index: LinkageIndex::new(),
            forward: BTreeMap::new(),
        }
    }

    /// Assign a record to a family, creating or merging families as the
    /// linkage requires. Idempotent: a known (source, publication)
    /// key is a no-op returning the current assignment.
    pub fn ingest(&mut self, record: RawRecord, now: DateTime<Utc>) -> PatfamResult<IngestOutcome> {
        record.validate(now)?;
        let record = normalize_boundary(record);
        let key = record.key();

        if let Some(existing) = self.index.family_of_record(&key) {
            debug!(key = %key, family = %existing, "re-ingest is a no-op");
            return Ok(IngestOutcome {
                family_id: existing.clone(),
                created: false,
                merged_from: Vec::new(),
                changed: false,
            });
        }

        let priority_matches = self.index.families_for_priorities(&record.priority_numbers);
        let (family_id, created, merged_from) = if !priority_matches.is_empty() {
            if priority_matches.len() > 1 {
                let (survivor, absorbed) = self.merge_families(&priority_matches);
                info!(
                    key = %key,
                    survivor = %survivor,
                    absorbed = absorbed.len(),
                    "bridge record merged families"
                );
                (survivor, false, absorbed)
            } else {
                let id = priority_matches.first().cloned().unwrap_or_default();
                (id, false, Vec::new())
            }
        } else if let Some(id) = record
            .family_hint_id
            .as_deref()
            .and_then(|h| self.index.family_for_hint(h))
            .cloned()
        {
            (id, false, Vec::new())
        } else if let Some(id) = self.fuzzy_target(&record) {
            (id, false, Vec::new())
        } else {
            self.create_family(&record, now)
        };

        // Commit the assignment: record, membership, indexes, canonical.
        self.index.bind(
            &family_id,
            &key,
            &record.priority_numbers,
            record.family_hint_id.as_deref(),
        );
        self.records.insert(key.clone(), record.clone());
        if let Some(family) = self.families.get_mut(&family_id) {
            family.member_keys.insert(key.clone());
            if let Some(hint) = &record.family_hint_id {
                family.hints.insert(hint.clone());
            }
        }
        self.refresh_canonical(&family_id, now);
        debug!(key = %key, family = %family_id, created, "record assigned");

        Ok(IngestOutcome {
            family_id,
            created,
            merged_from,
            changed: true,
        })
    }

    pub fn family(&self, family_id: &str) -> Option<&Family> {
        self.families.get(family_id)
    }

    /// Follow merge redirects to the id a family lives under now. An id
    /// never merged away maps to itself. Survivors carry smaller ids
    /// than the families they absorb, so the chain is finite.
    pub fn current_id(&self, family_id: &str) -> FamilyId {
        let mut id = family_id.to_string();
        while let Some(next) = self.forward.get(&id) {
            id = next.clone();
        }
        id
    }

    /// Record the version the store last acknowledged for a family.
    pub fn set_version(&mut self, family_id: &str, version: u64) {
        if let Some(family) = self.families.get_mut(family_id) {
            family.version = version;
        }
    }

    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.values()
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Cloned member records of a family, in key order.
    pub fn members_of(&self, family_id: &str) -> Vec<RawRecord> {
        self.families
            .get(family_id)
            .map(|f| {
                f.member_keys
                    .iter()
                    .filter_map(|k| self.records.get(k).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Restore a previously materialized family (startup rebuild from
    /// the store). Members are bound into the linkage index as-is.
    pub fn restore(&mut self, family: Family, members: Vec<RawRecord>) {
        for member in members {
            let key = member.key();
            self.index.bind(
                &family.family_id,
                &key,
                &member.priority_numbers,
                member.family_hint_id.as_deref(),
            );
            self.records.insert(key, member);
        }
        self.families.insert(family.family_id.clone(), family);
    }

    /// Fuzzy fallback, only for records with no priority linkage at
    /// all: best-scoring family above threshold, smallest id on ties.
    fn fuzzy_target(&self, record: &RawRecord) -> Option<FamilyId> {
        if !record.priority_numbers.is_empty() {
            return None;
        }
        let mut best: Option<(f64, &FamilyId)> = None;
        for (id, family) in &self.families {
            let Some(score) = self.matcher.score(record, &family.canonical) else {
                continue;
            };
            if score < self.matcher.min_score() {
                continue;
            }
            // Strict > keeps the smallest id on ties (BTreeMap order).
            match best {
                Some((top, _)) if score <= top => {}
                _ => best = Some((score, id)),
            }
        }
        best.map(|(_, id)| id.clone())
    }

    /// Union several families under the lexicographically smallest id.
    fn merge_families(&mut self, ids: &BTreeSet<FamilyId>) -> (FamilyId, Vec<FamilyId>) {
        let mut iter = ids.iter();
        let Some(survivor_id) = iter.next().cloned() else {
            return (FamilyId::default(), Vec::new());
        };
        let absorbed_ids: Vec<FamilyId> = iter.cloned().collect();

        for absorbed_id in &absorbed_ids {
            let Some(absorbed) = self.families.remove(absorbed_id) else {
                continue;
            };
            self.forward
                .insert(absorbed_id.clone(), survivor_id.clone());
            self.index.rebind_family(
                &survivor_id,
                &absorbed.member_keys,
                &absorbed.canonical.priority_numbers,
                &absorbed.hints,
            );
            if let Some(survivor) = self.families.get_mut(&survivor_id) {
                survivor.member_keys.extend(absorbed.member_keys);
                survivor.hints.extend(absorbed.hints);
            }
        }
        (survivor_id, absorbed_ids)
    }

    /// Create a new family keyed on the record's smallest linking key.
    /// If a family with the derived id already exists (same publication
    /// number seen from another source), join it instead.
    fn create_family(&mut self, record: &RawRecord, now: DateTime<Utc>) -> (FamilyId, bool, Vec<FamilyId>) {
        let linking_key = record
            .priority_numbers
            .first()
            .cloned()
            .unwrap_or_else(|| record.publication_number.clone());
        let family_id = derive_family_id(&linking_key);
        if self.families.contains_key(&family_id) {
            return (family_id, false, Vec::new());
        }

        let family = Family {
            family_id: family_id.clone(),
            member_keys: BTreeSet::new(),
            hints: BTreeSet::new(),
            // Placeholder until the commit step refreshes it.
            canonical: single_member_canonical(record),
            version: 0,
            resolved_at: now,
        };
        self.families.insert(family_id.clone(), family);
        (family_id, true, Vec::new())
    }

    /// Recompute the canonical record from the full member set.
    fn refresh_canonical(&mut self, family_id: &str, now: DateTime<Utc>) {
        let members = self.members_of(family_id);
        if let Some(canonical) = merge(&members, &self.table) {
            if let Some(family) = self.families.get_mut(family_id) {
                family.canonical = canonical;
                family.resolved_at = now;
            }
        }
    }
}

/// Defensive boundary normalization: publication, application, and
/// priority numbers in canonical form, jurisdiction uppercased.
fn normalize_boundary(mut record: RawRecord) -> RawRecord {
    record.publication_number = normalize_number(&record.publication_number);
    record.application_number = normalize_number(&record.application_number);
    record.priority_numbers = record
        .priority_numbers
        .iter()
        .map(|p| normalize_number(p))
        .filter(|p| !p.is_empty())
        .collect();
    record.jurisdiction = record.jurisdiction.trim().to_uppercase();
    record
}

/// Canonical view of a single record, used as the seed for a new family.
fn single_member_canonical(record: &RawRecord) -> patfam_core::record::CanonicalRecord {
    patfam_core::record::CanonicalRecord {
        title: record.title.clone(),
        application_number: record.application_number.clone(),
        publication_number: record.publication_number.clone(),
        jurisdictions: [record.jurisdiction.to_uppercase()].into(),
        priority_numbers: record.priority_numbers.clone(),
        inventors: record.inventors.clone(),
        filing_date: record.filing_date,
        grant_date: record.grant_date,
        legal_status: record.legal_status,
        provenance: BTreeMap::new(),
    }
}
