//! v001: families.

use rusqlite::Connection;

use patfam_core::errors::PatfamResult;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> PatfamResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS families (
            family_id    TEXT PRIMARY KEY,
            canonical    TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            version      INTEGER NOT NULL,
            hints        TEXT NOT NULL DEFAULT '[]',
            resolved_at  TEXT NOT NULL,
            updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_families_hash ON families(content_hash);
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
