//! v004: cliff_facts (append-only computation history per family).

use rusqlite::Connection;

use patfam_core::errors::PatfamResult;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> PatfamResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cliff_facts (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            family_id        TEXT NOT NULL,
            base_term_end    TEXT NOT NULL,
            adjustments      TEXT NOT NULL DEFAULT '[]',
            effective_expiry TEXT NOT NULL,
            status           TEXT NOT NULL,
            as_of            TEXT NOT NULL,
            computed_at      TEXT NOT NULL,
            UNIQUE (family_id, computed_at)
        );

        CREATE INDEX IF NOT EXISTS idx_cliff_family ON cliff_facts(family_id);
        CREATE INDEX IF NOT EXISTS idx_cliff_status ON cliff_facts(status);
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
