//! Raw member record persistence.

use rusqlite::{params, Connection};

use patfam_core::errors::PatfamResult;
use patfam_core::record::RawRecord;

use crate::to_store_err;

/// Insert or replace one member record under its family.
pub fn upsert_record(conn: &Connection, family_id: &str, record: &RawRecord) -> PatfamResult<()> {
    let payload = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO records (source, publication_number, family_id, payload, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (source, publication_number) DO UPDATE SET
            family_id = excluded.family_id,
            payload = excluded.payload,
            fetched_at = excluded.fetched_at",
        params![
            record.source.as_str(),
            record.publication_number,
            family_id,
            payload,
            record.fetched_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_store_err(format!("upsert_record: {e}")))?;
    Ok(())
}

/// Repoint every record of an absorbed family at the survivor.
pub fn rebind_records(conn: &Connection, survivor: &str, absorbed: &str) -> PatfamResult<usize> {
    conn.execute(
        "UPDATE records SET family_id = ?1 WHERE family_id = ?2",
        params![survivor, absorbed],
    )
    .map_err(|e| to_store_err(format!("rebind_records: {e}")))
}

/// Member records of one family, in key order.
pub fn load_for_family(conn: &Connection, family_id: &str) -> PatfamResult<Vec<RawRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT payload FROM records WHERE family_id = ?1
             ORDER BY source, publication_number",
        )
        .map_err(|e| to_store_err(format!("load_for_family prepare: {e}")))?;
    let rows = stmt
        .query_map(params![family_id], |row| row.get::<_, String>(0))
        .map_err(|e| to_store_err(format!("load_for_family query: {e}")))?;
    let mut records = Vec::new();
    for payload in rows {
        let payload = payload.map_err(|e| to_store_err(e.to_string()))?;
        records.push(serde_json::from_str(&payload)?);
    }
    Ok(records)
}

/// Total number of stored records.
pub fn count(conn: &Connection) -> PatfamResult<u64> {
    conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
        .map_err(|e| to_store_err(format!("record count: {e}")))
}
