//! Idempotent family upsert with optimistic version checking.
//!
//! The caller passes the version it last observed. A stored version
//! that differs means another writer got there first: the transaction
//! rolls back with a race error and the caller re-merges from the
//! latest state and retries.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use patfam_core::errors::{PatfamError, PatfamResult, StoreError};
use patfam_core::family::{Family, LineageEntry, MaterializationResult};
use patfam_core::record::RawRecord;

use crate::queries::{family_ops, lineage_ops, priority_ops, record_ops};
use crate::to_store_err;

/// Field set recorded in the first lineage entry of a family.
const ALL_FIELDS: [&str; 9] = [
    "title",
    "application_number",
    "publication_number",
    "jurisdictions",
    "priority_numbers",
    "inventors",
    "filing_date",
    "grant_date",
    "legal_status",
];

/// Persist a family and its member records in one transaction.
///
/// Unchanged canonical content is a no-op for the family row and the
/// lineage (`changed = false`, version untouched); member records are
/// still upserted so late duplicates land durably.
pub fn materialize(
    conn: &Connection,
    family: &Family,
    members: &[RawRecord],
    now: DateTime<Utc>,
) -> PatfamResult<MaterializationResult> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_store_err(format!("materialize begin: {e}")))?;

    match materialize_inner(&tx, family, members, now) {
        Ok(result) => {
            tx.commit()
                .map_err(|e| to_store_err(format!("materialize commit: {e}")))?;
            Ok(result)
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

fn materialize_inner(
    conn: &Connection,
    family: &Family,
    members: &[RawRecord],
    now: DateTime<Utc>,
) -> PatfamResult<MaterializationResult> {
    let existing = family_ops::get_family(conn, &family.family_id)?;
    let content_hash = family.canonical.content_hash();

    let result = match existing {
        Some(row) => {
            if row.version != family.version {
                return Err(PatfamError::Store(StoreError::VersionRace {
                    family_id: family.family_id.clone(),
                    expected: family.version,
                    actual: row.version,
                }));
            }
            if row.content_hash == content_hash {
                MaterializationResult {
                    family_id: family.family_id.clone(),
                    changed: false,
                    version: row.version,
                    changed_fields: Vec::new(),
                }
            } else {
                let changed_fields = row.canonical.changed_fields(&family.canonical);
                let version = row.version + 1;
                family_ops::upsert_family(
                    conn,
                    &family.family_id,
                    &family.canonical,
                    &content_hash,
                    version,
                    &family.hints,
                    family.resolved_at,
                )?;
                lineage_ops::append(
                    conn,
                    &family.family_id,
                    &LineageEntry {
                        version,
                        changed_fields: changed_fields.clone(),
                        at: now,
                    },
                )?;
                MaterializationResult {
                    family_id: family.family_id.clone(),
                    changed: true,
                    version,
                    changed_fields,
                }
            }
        }
        None => {
            if family.version != 0 {
                return Err(PatfamError::Store(StoreError::VersionRace {
                    family_id: family.family_id.clone(),
                    expected: family.version,
                    actual: 0,
                }));
            }
            let changed_fields: Vec<String> = ALL_FIELDS.iter().map(|f| f.to_string()).collect();
            family_ops::upsert_family(
                conn,
                &family.family_id,
                &family.canonical,
                &content_hash,
                1,
                &family.hints,
                family.resolved_at,
            )?;
            lineage_ops::append(
                conn,
                &family.family_id,
                &LineageEntry {
                    version: 1,
                    changed_fields: changed_fields.clone(),
                    at: now,
                },
            )?;
            MaterializationResult {
                family_id: family.family_id.clone(),
                changed: true,
                version: 1,
                changed_fields,
            }
        }
    };

    for member in members {
        record_ops::upsert_record(conn, &family.family_id, member)?;
    }
    let priorities: Vec<String> = family.canonical.priority_numbers.iter().cloned().collect();
    priority_ops::bind(conn, &family.family_id, &priorities)?;
    Ok(result)
}
