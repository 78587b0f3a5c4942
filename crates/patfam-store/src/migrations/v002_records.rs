//! v002: records (raw member records, keyed by source + publication).

use rusqlite::Connection;

use patfam_core::errors::PatfamResult;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> PatfamResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            source             TEXT NOT NULL,
            publication_number TEXT NOT NULL,
            family_id          TEXT NOT NULL,
            payload            TEXT NOT NULL,
            fetched_at         TEXT NOT NULL,
            PRIMARY KEY (source, publication_number)
        );

        CREATE INDEX IF NOT EXISTS idx_records_family ON records(family_id);
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
