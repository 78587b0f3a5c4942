//! Sequential schema migrations, tracked in `schema_migrations`.

pub mod v001_families;
pub mod v002_records;
pub mod v003_lineage;
pub mod v004_cliff_facts;
pub mod v005_priority_index;

use rusqlite::Connection;
use tracing::info;

use patfam_core::errors::{PatfamError, PatfamResult, StoreError};

use crate::to_store_err;

type Migration = (u32, &'static str, fn(&Connection) -> PatfamResult<()>);

/// All migrations, in apply order. Append-only: never reorder or edit a
/// shipped migration.
const MIGRATIONS: &[Migration] = &[
    (1, "families", v001_families::migrate),
    (2, "records", v002_records::migrate),
    (3, "lineage", v003_lineage::migrate),
    (4, "cliff_facts", v004_cliff_facts::migrate),
    (5, "priority_index", v005_priority_index::migrate),
];

/// Apply every migration not yet recorded, in order.
pub fn run_migrations(conn: &Connection) -> PatfamResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            name        TEXT NOT NULL,
            applied_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .map_err(|e| to_store_err(e.to_string()))?;

    let current = current_version(conn)?;
    for (version, name, migrate) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        migrate(conn).map_err(|e| {
            PatfamError::Store(StoreError::MigrationFailed {
                version: *version,
                reason: e.to_string(),
            })
        })?;
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            rusqlite::params![version, name],
        )
        .map_err(|e| to_store_err(e.to_string()))?;
        info!(version, name, "applied migration");
    }
    Ok(())
}

/// Highest applied migration version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> PatfamResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| to_store_err(e.to_string()))
}
