//! The linkage index: the explicit map structures behind the union-find
//! semantics. Priority numbers and hints are transitive, order-
//! independent equivalence keys; whichever family currently owns a key
//! is the join target.

use std::collections::{BTreeMap, BTreeSet};

use patfam_core::family::FamilyId;
use patfam_core::record::RecordKey;

/// Secondary indexes from linking keys to family ids.
#[derive(Debug, Default, Clone)]
pub struct LinkageIndex {
    by_priority: BTreeMap<String, FamilyId>,
    by_hint: BTreeMap<String, FamilyId>,
    by_record: BTreeMap<RecordKey, FamilyId>,
}

impl LinkageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The family that already owns this record key, if any.
    pub fn family_of_record(&self, key: &RecordKey) -> Option<&FamilyId> {
        self.by_record.get(key)
    }

    /// Every distinct family reachable through any of these priority
    /// numbers. More than one means a bridge record just arrived.
    pub fn families_for_priorities(&self, priorities: &BTreeSet<String>) -> BTreeSet<FamilyId> {
        priorities
            .iter()
            .filter_map(|p| self.by_priority.get(p).cloned())
            .collect()
    }

    pub fn family_for_hint(&self, hint: &str) -> Option<&FamilyId> {
        self.by_hint.get(hint)
    }

    /// Bind a record and its linking keys to a family.
    pub fn bind(
        &mut self,
        family_id: &FamilyId,
        key: &RecordKey,
        priorities: &BTreeSet<String>,
        hint: Option<&str>,
    ) {
        self.by_record.insert(key.clone(), family_id.clone());
        for priority in priorities {
            self.by_priority.insert(priority.clone(), family_id.clone());
        }
        if let Some(hint) = hint {
            self.by_hint.insert(hint.to_string(), family_id.clone());
        }
    }

    /// Repoint an absorbed family's keys at the surviving family.
    pub fn rebind_family(
        &mut self,
        survivor: &FamilyId,
        members: &BTreeSet<RecordKey>,
        priorities: &BTreeSet<String>,
        hints: &BTreeSet<String>,
    ) {
        for key in members {
            self.by_record.insert(key.clone(), survivor.clone());
        }
        for priority in priorities {
            self.by_priority.insert(priority.clone(), survivor.clone());
        }
        for hint in hints {
            self.by_hint.insert(hint.clone(), survivor.clone());
        }
    }

    pub fn record_count(&self) -> usize {
        self.by_record.len()
    }
}
