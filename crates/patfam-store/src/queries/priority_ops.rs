//! priority_index table: normalized priority number -> owning family.
//!
//! Backs the resolver's priority linkage durably; a late re-submit can
//! be routed to its family straight from the store.

use rusqlite::{Connection, OptionalExtension};

use patfam_core::errors::PatfamResult;
use patfam_core::family::FamilyId;

use crate::to_store_err;

/// Bind a set of priority numbers to a family. A number already bound
/// to another family is repointed (the caller has decided the merge).
pub fn bind(conn: &Connection, family_id: &FamilyId, numbers: &[String]) -> PatfamResult<()> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO priority_index (priority_number, family_id) VALUES (?1, ?2)
             ON CONFLICT(priority_number) DO UPDATE SET family_id = excluded.family_id",
        )
        .map_err(|e| to_store_err(format!("priority bind prepare: {e}")))?;
    for number in numbers {
        stmt.execute(rusqlite::params![number, family_id])
            .map_err(|e| to_store_err(format!("priority bind {number}: {e}")))?;
    }
    Ok(())
}

/// Repoint every binding of the absorbed family at the survivor.
pub fn rebind(conn: &Connection, survivor: &FamilyId, absorbed: &FamilyId) -> PatfamResult<usize> {
    conn.execute(
        "UPDATE priority_index SET family_id = ?1 WHERE family_id = ?2",
        rusqlite::params![survivor, absorbed],
    )
    .map_err(|e| to_store_err(format!("priority rebind: {e}")))
}

/// Family owning a normalized priority number, if any.
pub fn family_for(conn: &Connection, number: &str) -> PatfamResult<Option<FamilyId>> {
    conn.query_row(
        "SELECT family_id FROM priority_index WHERE priority_number = ?1",
        rusqlite::params![number],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| to_store_err(format!("priority lookup: {e}")))
}
