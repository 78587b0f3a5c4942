//! Read and upsert operations on the families table.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use patfam_core::errors::PatfamResult;
use patfam_core::record::CanonicalRecord;

use crate::to_store_err;

/// A stored family row, before member keys are attached.
#[derive(Debug, Clone)]
pub struct FamilyRow {
    pub family_id: String,
    pub canonical: CanonicalRecord,
    pub content_hash: String,
    pub version: u64,
    pub hints: BTreeSet<String>,
    pub resolved_at: DateTime<Utc>,
}

/// Fetch one family row by id.
pub fn get_family(conn: &Connection, family_id: &str) -> PatfamResult<Option<FamilyRow>> {
    conn.query_row(
        "SELECT family_id, canonical, content_hash, version, hints, resolved_at
         FROM families WHERE family_id = ?1",
        params![family_id],
        row_to_family,
    )
    .optional()
    .map_err(|e| to_store_err(format!("get_family: {e}")))?
    .transpose()
}

/// All family rows, in id order.
pub fn load_all(conn: &Connection) -> PatfamResult<Vec<FamilyRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT family_id, canonical, content_hash, version, hints, resolved_at
             FROM families ORDER BY family_id",
        )
        .map_err(|e| to_store_err(format!("load_all prepare: {e}")))?;
    let rows = stmt
        .query_map([], row_to_family)
        .map_err(|e| to_store_err(format!("load_all query: {e}")))?;
    let mut families = Vec::new();
    for row in rows {
        families.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(families)
}

/// Insert or replace a family row at the given version.
pub fn upsert_family(
    conn: &Connection,
    family_id: &str,
    canonical: &CanonicalRecord,
    content_hash: &str,
    version: u64,
    hints: &BTreeSet<String>,
    resolved_at: DateTime<Utc>,
) -> PatfamResult<()> {
    let canonical_json = serde_json::to_string(canonical)?;
    let hints_json = serde_json::to_string(hints)?;
    conn.execute(
        "INSERT INTO families (family_id, canonical, content_hash, version, hints, resolved_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         ON CONFLICT (family_id) DO UPDATE SET
            canonical = excluded.canonical,
            content_hash = excluded.content_hash,
            version = excluded.version,
            hints = excluded.hints,
            resolved_at = excluded.resolved_at,
            updated_at = excluded.updated_at",
        params![
            family_id,
            canonical_json,
            content_hash,
            version,
            hints_json,
            resolved_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_store_err(format!("upsert_family: {e}")))?;
    Ok(())
}

/// Remove a family row (absorbed by a merge). Lineage is kept for audit.
pub fn delete_family(conn: &Connection, family_id: &str) -> PatfamResult<()> {
    conn.execute("DELETE FROM families WHERE family_id = ?1", params![family_id])
        .map_err(|e| to_store_err(format!("delete_family: {e}")))?;
    Ok(())
}

fn row_to_family(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatfamResult<FamilyRow>> {
    let family_id: String = row.get(0)?;
    let canonical_json: String = row.get(1)?;
    let content_hash: String = row.get(2)?;
    let version: u64 = row.get(3)?;
    let hints_json: String = row.get(4)?;
    let resolved_at: String = row.get(5)?;
    Ok(build_family(
        family_id,
        canonical_json,
        content_hash,
        version,
        hints_json,
        resolved_at,
    ))
}

fn build_family(
    family_id: String,
    canonical_json: String,
    content_hash: String,
    version: u64,
    hints_json: String,
    resolved_at: String,
) -> PatfamResult<FamilyRow> {
    let canonical: CanonicalRecord = serde_json::from_str(&canonical_json)?;
    let hints: BTreeSet<String> = serde_json::from_str(&hints_json)?;
    let resolved_at = DateTime::parse_from_rfc3339(&resolved_at)
        .map_err(|e| to_store_err(format!("bad resolved_at: {e}")))?
        .with_timezone(&Utc);
    Ok(FamilyRow {
        family_id,
        canonical,
        content_hash,
        version,
        hints,
        resolved_at,
    })
}
