//! Append-only lineage history per family.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use patfam_core::errors::PatfamResult;
use patfam_core::family::LineageEntry;

use crate::to_store_err;

/// Append one version entry. The UNIQUE (family_id, version) constraint
/// rejects duplicate versions, keeping the history strictly increasing.
pub fn append(conn: &Connection, family_id: &str, entry: &LineageEntry) -> PatfamResult<()> {
    let fields_json = serde_json::to_string(&entry.changed_fields)?;
    conn.execute(
        "INSERT INTO lineage (family_id, version, changed_fields, at)
         VALUES (?1, ?2, ?3, ?4)",
        params![family_id, entry.version, fields_json, entry.at.to_rfc3339()],
    )
    .map_err(|e| to_store_err(format!("lineage append: {e}")))?;
    Ok(())
}

/// Full history for one family, oldest first.
pub fn for_family(conn: &Connection, family_id: &str) -> PatfamResult<Vec<LineageEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT version, changed_fields, at FROM lineage
             WHERE family_id = ?1 ORDER BY version",
        )
        .map_err(|e| to_store_err(format!("lineage prepare: {e}")))?;
    let rows = stmt
        .query_map(params![family_id], |row| {
            Ok((
                row.get::<_, u64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(|e| to_store_err(format!("lineage query: {e}")))?;

    let mut entries = Vec::new();
    for row in rows {
        let (version, fields_json, at) = row.map_err(|e| to_store_err(e.to_string()))?;
        entries.push(LineageEntry {
            version,
            changed_fields: serde_json::from_str(&fields_json)?,
            at: DateTime::parse_from_rfc3339(&at)
                .map_err(|e| to_store_err(format!("bad lineage timestamp: {e}")))?
                .with_timezone(&Utc),
        });
    }
    Ok(entries)
}

/// Total number of lineage entries across all families.
pub fn count(conn: &Connection) -> PatfamResult<u64> {
    conn.query_row("SELECT COUNT(*) FROM lineage", [], |row| row.get(0))
        .map_err(|e| to_store_err(format!("lineage count: {e}")))
}
