//! The resolution/merge/materialize/cliff pipeline.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use patfam_cliff::CliffCalculator;
use patfam_core::cliff::CliffFact;
use patfam_core::config::PatfamConfig;
use patfam_core::errors::{PatfamError, PatfamResult};
use patfam_core::family::{FamilyId, MaterializationResult};
use patfam_core::record::{CanonicalRecord, RawRecord};
use patfam_core::traits::{IClock, IRecordSink};
use patfam_crawl::StatusBoard;
use patfam_merge::PrecedenceTable;
use patfam_resolver::FamilyResolver;
use patfam_store::StoreEngine;

/// Race losses beyond this indicate a bug, not contention.
const MAX_RACE_RETRIES: usize = 3;

/// What processing one record produced.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub family_id: FamilyId,
    /// None when the record was an idempotent re-ingest.
    pub materialization: Option<MaterializationResult>,
    pub cliff: Option<CliffFact>,
}

/// The serialized per-family pipeline. Implements the record sink the
/// orchestrator forwards into.
pub struct Pipeline {
    resolver: Mutex<FamilyResolver>,
    store: Arc<StoreEngine>,
    calculator: CliffCalculator,
    clock: Arc<dyn IClock>,
    status: Arc<StatusBoard>,
    family_locks: DashMap<FamilyId, Arc<Mutex<()>>>,
}

impl Pipeline {
    /// Build the pipeline and rebuild the resolver's linkage index from
    /// the store, so a restart resumes clustering where it left off.
    pub fn new(
        config: &PatfamConfig,
        store: Arc<StoreEngine>,
        clock: Arc<dyn IClock>,
        status: Arc<StatusBoard>,
    ) -> PatfamResult<Self> {
        let mut resolver =
            FamilyResolver::new(config.resolver.clone(), PrecedenceTable::default());
        let restored = store.load_families()?;
        let families = restored.len();
        for (family, members) in restored {
            resolver.restore(family, members);
        }
        if families > 0 {
            debug!(families, "rebuilt linkage index from store");
        }
        Ok(Self {
            resolver: Mutex::new(resolver),
            store,
            calculator: CliffCalculator::new(config.cliff.clone()),
            clock,
            status,
            family_locks: DashMap::new(),
        })
    }

    /// Run one record through ingest, merge, materialize, and cliff.
    pub fn process(&self, record: RawRecord) -> PatfamResult<ProcessOutcome> {
        let now = self.clock.now();
        let source = record.source;

        // The join decision commits under the resolver lock.
        let outcome = {
            let mut resolver = self.lock_resolver()?;
            resolver.ingest(record, now)?
        };
        if !outcome.changed {
            return Ok(ProcessOutcome {
                family_id: outcome.family_id,
                materialization: None,
                cliff: None,
            });
        }

        // Everything durable for this family happens under its scope. A
        // concurrent bridge record can merge the family away between
        // the ingest and the lock acquisition, so the scope re-resolves
        // the id once the lock is held.
        let merged_from = outcome.merged_from.clone();
        let (family_id, result, cliff) =
            self.with_family_scope(&outcome.family_id, |family_id| {
                for absorbed in &merged_from {
                    self.absorb_durably(family_id, absorbed)?;
                }
                match self.materialize_with_retry(family_id, now)? {
                    Some((result, canonical)) => {
                        let cliff = if result.changed {
                            Some(self.compute_cliff(family_id, &canonical, now)?)
                        } else {
                            None
                        };
                        Ok((family_id.clone(), Some(result), cliff))
                    }
                    // Merged away mid-flight; the surviving family's
                    // writer persists this record with the rest.
                    None => Ok((family_id.clone(), None, None)),
                }
            })?;
        if result.is_some() {
            self.status.materialized(source, now);
        }
        Ok(ProcessOutcome {
            family_id,
            materialization: result,
            cliff,
        })
    }

    /// Run `f` under the family's mutual-exclusion lock, following any
    /// merge redirect that landed between the caller's snapshot and the
    /// lock acquisition. `f` sees the id the family currently lives
    /// under.
    fn with_family_scope<T>(
        &self,
        family_id: &FamilyId,
        mut f: impl FnMut(&FamilyId) -> PatfamResult<T>,
    ) -> PatfamResult<T> {
        let mut id = family_id.clone();
        loop {
            let scope = self.family_lock(&id);
            let guard = scope
                .lock()
                .map_err(|e| PatfamError::config(format!("family lock poisoned: {e}")))?;
            let current = self.lock_resolver()?.current_id(&id);
            if current == id {
                let out = f(&id);
                drop(guard);
                return out;
            }
            drop(guard);
            id = current;
        }
    }

    /// Apply a merge-of-families to the store. Takes the absorbed
    /// family's lock so a writer mid-materialization of that id
    /// finishes before its rows are moved and its family row dropped.
    /// Survivor ids sort below absorbed ids, which keeps the two-lock
    /// acquisition order consistent across threads.
    fn absorb_durably(&self, survivor: &FamilyId, absorbed: &FamilyId) -> PatfamResult<()> {
        let scope = self.family_lock(absorbed);
        {
            let _guard = scope
                .lock()
                .map_err(|e| PatfamError::config(format!("family lock poisoned: {e}")))?;
            self.store.absorb_family(survivor, absorbed)?;
        }
        // Drop the registry entry only when no other thread holds it; a
        // waiter that still does will re-resolve to the survivor.
        self.family_locks
            .remove_if(absorbed, |_, lock| Arc::strong_count(lock) <= 2);
        Ok(())
    }

    /// Materialize the family's current state. A version race means the
    /// store moved ahead of the resolver's view; adopt the stored
    /// version and retry with the same content. `None` means the family
    /// was merged away after this scope was entered; the surviving
    /// family's writer persists the content instead.
    fn materialize_with_retry(
        &self,
        family_id: &FamilyId,
        now: DateTime<Utc>,
    ) -> PatfamResult<Option<(MaterializationResult, CanonicalRecord)>> {
        for _ in 0..MAX_RACE_RETRIES {
            let snapshot = {
                let resolver = self.lock_resolver()?;
                resolver
                    .family(family_id)
                    .cloned()
                    .map(|f| (f, resolver.members_of(family_id)))
            };
            let Some((family, members)) = snapshot else {
                debug!(%family_id, "family merged away before materialization");
                return Ok(None);
            };
            match self.store.materialize(&family, &members, now) {
                Ok(result) => {
                    let mut resolver = self.lock_resolver()?;
                    resolver.set_version(family_id, result.version);
                    return Ok(Some((result, family.canonical)));
                }
                Err(PatfamError::Store(ref e)) if e.is_race() => {
                    let stored = self.store.family(family_id)?;
                    let actual = stored.map(|f| f.version).unwrap_or(0);
                    warn!(%family_id, actual, "lost materialization race, retrying");
                    let mut resolver = self.lock_resolver()?;
                    resolver.set_version(family_id, actual);
                }
                Err(e) => return Err(e),
            }
        }
        Err(PatfamError::config(format!(
            "family {family_id} kept losing materialization races"
        )))
    }

    fn compute_cliff(
        &self,
        family_id: &FamilyId,
        canonical: &CanonicalRecord,
        now: DateTime<Utc>,
    ) -> PatfamResult<CliffFact> {
        let fact = self
            .calculator
            .compute(family_id, canonical, now.date_naive(), now);
        self.store.append_cliff_fact(&fact)?;
        Ok(fact)
    }

    fn lock_resolver(&self) -> PatfamResult<std::sync::MutexGuard<'_, FamilyResolver>> {
        self.resolver
            .lock()
            .map_err(|e| PatfamError::config(format!("resolver lock poisoned: {e}")))
    }

    fn family_lock(&self, family_id: &FamilyId) -> Arc<Mutex<()>> {
        self.family_locks
            .entry(family_id.clone())
            .or_default()
            .clone()
    }

    pub fn store(&self) -> &StoreEngine {
        &self.store
    }

    /// Current number of resolved families.
    pub fn family_count(&self) -> usize {
        self.resolver.lock().map(|r| r.family_count()).unwrap_or(0)
    }
}

impl IRecordSink for Pipeline {
    fn accept(&self, record: RawRecord) -> PatfamResult<()> {
        self.process(record).map(|_| ())
    }
}
