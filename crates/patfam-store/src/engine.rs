//! StoreEngine — owns the ConnectionPool, runs migrations on open, and
//! exposes the family/lineage/cliff operations the pipeline uses.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use patfam_core::cliff::{CliffFact, CliffStatus};
use patfam_core::errors::PatfamResult;
use patfam_core::family::{Family, FamilyId, LineageEntry, MaterializationResult};
use patfam_core::record::RawRecord;

use crate::materializer;
use crate::migrations;
use crate::pool::ConnectionPool;
use crate::queries::{cliff_ops, family_ops, health, lineage_ops, priority_ops, record_ops};
use crate::to_store_err;

pub use crate::queries::health::StoreHealth;

/// The durable family store.
pub struct StoreEngine {
    pool: ConnectionPool,
}

impl StoreEngine {
    /// Open a store backed by a file on disk.
    pub fn open(path: &Path) -> PatfamResult<Self> {
        let engine = Self {
            pool: ConnectionPool::open(path)?,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> PatfamResult<Self> {
        let engine = Self {
            pool: ConnectionPool::open_in_memory()?,
        };
        engine.initialize()?;
        Ok(engine)
    }

    fn initialize(&self) -> PatfamResult<()> {
        self.pool.with_writer(migrations::run_migrations)
    }

    fn with_reader<F, T>(&self, f: F) -> PatfamResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> PatfamResult<T>,
    {
        self.pool.with_reader(f)
    }

    /// Idempotent upsert of a family and its members. See
    /// [`materializer::materialize`] for the version-race contract.
    pub fn materialize(
        &self,
        family: &Family,
        members: &[RawRecord],
        now: DateTime<Utc>,
    ) -> PatfamResult<MaterializationResult> {
        self.pool
            .with_writer(|conn| materializer::materialize(conn, family, members, now))
    }

    /// Apply a merge-of-families to the store: repoint the absorbed
    /// family's records at the survivor and drop its family row and
    /// cliff fact. Lineage of the absorbed family is kept for audit.
    pub fn absorb_family(&self, survivor: &FamilyId, absorbed: &FamilyId) -> PatfamResult<()> {
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_store_err(format!("absorb begin: {e}")))?;
            let moved = record_ops::rebind_records(&tx, survivor, absorbed)?;
            priority_ops::rebind(&tx, survivor, absorbed)?;
            family_ops::delete_family(&tx, absorbed)?;
            cliff_ops::delete(&tx, absorbed)?;
            tx.commit()
                .map_err(|e| to_store_err(format!("absorb commit: {e}")))?;
            debug!(%survivor, %absorbed, moved, "absorbed family");
            Ok(())
        })
    }

    /// One stored family, with member keys rebuilt from its records.
    pub fn family(&self, family_id: &str) -> PatfamResult<Option<Family>> {
        self.with_reader(|conn| {
            let Some(row) = family_ops::get_family(conn, family_id)? else {
                return Ok(None);
            };
            let members = record_ops::load_for_family(conn, family_id)?;
            Ok(Some(assemble(row, &members)))
        })
    }

    /// Every stored family with its member records, for startup rebuild.
    pub fn load_families(&self) -> PatfamResult<Vec<(Family, Vec<RawRecord>)>> {
        self.with_reader(|conn| {
            let rows = family_ops::load_all(conn)?;
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let members = record_ops::load_for_family(conn, &row.family_id)?;
                let family = assemble(row, &members);
                out.push((family, members));
            }
            Ok(out)
        })
    }

    /// Family currently owning a normalized priority number, if any.
    pub fn family_for_priority(&self, number: &str) -> PatfamResult<Option<FamilyId>> {
        self.with_reader(|conn| priority_ops::family_for(conn, number))
    }

    /// Version history of one family, oldest first.
    pub fn lineage(&self, family_id: &str) -> PatfamResult<Vec<LineageEntry>> {
        self.with_reader(|conn| lineage_ops::for_family(conn, family_id))
    }

    /// Append one computed cliff fact to the family's history.
    pub fn append_cliff_fact(&self, fact: &CliffFact) -> PatfamResult<()> {
        self.pool.with_writer(|conn| cliff_ops::append(conn, fact))
    }

    /// The most recently computed fact for one family.
    pub fn cliff_fact(&self, family_id: &str) -> PatfamResult<Option<CliffFact>> {
        self.with_reader(|conn| cliff_ops::latest(conn, family_id))
    }

    /// Full cliff computation history for one family, oldest first.
    pub fn cliff_history(&self, family_id: &str) -> PatfamResult<Vec<CliffFact>> {
        self.with_reader(|conn| cliff_ops::history(conn, family_id))
    }

    /// Facts in a given status, soonest expiry first.
    pub fn cliff_facts_with_status(&self, status: CliffStatus) -> PatfamResult<Vec<CliffFact>> {
        self.with_reader(|conn| cliff_ops::with_status(conn, status))
    }

    pub fn health(&self) -> PatfamResult<StoreHealth> {
        self.with_reader(health::check)
    }
}

fn assemble(row: family_ops::FamilyRow, members: &[RawRecord]) -> Family {
    Family {
        family_id: row.family_id,
        member_keys: members.iter().map(|m| m.key()).collect(),
        hints: row.hints,
        canonical: row.canonical,
        version: row.version,
        resolved_at: row.resolved_at,
    }
}
