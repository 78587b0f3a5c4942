//! v003: lineage (append-only version history per family).

use rusqlite::Connection;

use patfam_core::errors::PatfamResult;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> PatfamResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS lineage (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            family_id      TEXT NOT NULL,
            version        INTEGER NOT NULL,
            changed_fields TEXT NOT NULL,
            at             TEXT NOT NULL,
            UNIQUE (family_id, version)
        );

        CREATE INDEX IF NOT EXISTS idx_lineage_family ON lineage(family_id);
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
