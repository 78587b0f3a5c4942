//! v005: priority_index (normalized priority number -> owning family).

use rusqlite::Connection;

use patfam_core::errors::PatfamResult;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> PatfamResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS priority_index (
            priority_number TEXT PRIMARY KEY,
            family_id       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_priority_family ON priority_index(family_id);
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
