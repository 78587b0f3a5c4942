//! Store health snapshot for the status endpoint.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use patfam_core::errors::PatfamResult;

use crate::pool::wal_active;
use crate::to_store_err;

/// Row counts plus journal-mode verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHealth {
    pub families: u64,
    pub records: u64,
    pub lineage_entries: u64,
    pub cliff_facts: u64,
    pub wal_active: bool,
}

pub fn check(conn: &Connection) -> PatfamResult<StoreHealth> {
    let count = |table: &str| -> PatfamResult<u64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(|e| to_store_err(format!("health count {table}: {e}")))
    };
    Ok(StoreHealth {
        families: count("families")?,
        records: count("records")?,
        lineage_entries: count("lineage")?,
        cliff_facts: count("cliff_facts")?,
        wal_active: wal_active(conn)?,
    })
}
