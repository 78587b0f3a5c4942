//! SQLite connections for the store: one mutex-guarded writer plus a
//! small ring of read-only connections sharing the writer's WAL.
//!
//! An in-memory store gets no reader ring, because every in-memory
//! connection is its own database; reads fall back to the writer there.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use patfam_core::errors::PatfamResult;

use crate::to_store_err;

/// Read-only connections opened for a file-backed store.
const READER_RING_SIZE: usize = 4;

pub struct ConnectionPool {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    cursor: AtomicUsize,
}

impl ConnectionPool {
    /// Open the writer and the reader ring for a database file.
    pub fn open(path: &Path) -> PatfamResult<Self> {
        let writer = Connection::open(path).map_err(|e| to_store_err(e.to_string()))?;
        apply_writer_pragmas(&writer)?;

        let mut readers = Vec::with_capacity(READER_RING_SIZE);
        for _ in 0..READER_RING_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| to_store_err(e.to_string()))?;
            apply_reader_pragmas(&conn)?;
            readers.push(Mutex::new(conn));
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            cursor: AtomicUsize::new(0),
        })
    }

    /// In-memory pool for tests: writer only, no reader ring.
    pub fn open_in_memory() -> PatfamResult<Self> {
        let writer = Connection::open_in_memory().map_err(|e| to_store_err(e.to_string()))?;
        apply_writer_pragmas(&writer)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            cursor: AtomicUsize::new(0),
        })
    }

    /// Run a closure on the exclusive write connection. All mutations
    /// serialize here; SQLite allows one writer at a time.
    pub fn with_writer<F, T>(&self, f: F) -> PatfamResult<T>
    where
        F: FnOnce(&Connection) -> PatfamResult<T>,
    {
        let guard = self
            .writer
            .lock()
            .map_err(|e| to_store_err(format!("writer lock poisoned: {e}")))?;
        f(&guard)
    }

    /// Run a closure on the next reader in the ring, round-robin. WAL
    /// readers are never blocked by the writer.
    pub fn with_reader<F, T>(&self, f: F) -> PatfamResult<T>
    where
        F: FnOnce(&Connection) -> PatfamResult<T>,
    {
        if self.readers.is_empty() {
            return self.with_writer(f);
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let guard = self.readers[idx]
            .lock()
            .map_err(|e| to_store_err(format!("reader lock poisoned: {e}")))?;
        f(&guard)
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }
}

fn apply_writer_pragmas(conn: &Connection) -> PatfamResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -64000;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))
}

// Read-only connections cannot switch journal modes; they inherit WAL
// from the writer.
fn apply_reader_pragmas(conn: &Connection) -> PatfamResult<()> {
    conn.execute_batch(
        "
        PRAGMA cache_size = -16000;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))
}

/// Whether WAL journaling is active on a connection. In-memory
/// databases report `memory` and never use WAL.
pub fn wal_active(conn: &Connection) -> PatfamResult<bool> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| to_store_err(e.to_string()))?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_rows(conn: &Connection) -> PatfamResult<i64> {
        conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .map_err(|e| to_store_err(e.to_string()))
    }

    fn seed(conn: &Connection) -> PatfamResult<()> {
        conn.execute_batch("CREATE TABLE t(x); INSERT INTO t VALUES (1)")
            .map_err(|e| to_store_err(e.to_string()))
    }

    #[test]
    fn in_memory_reads_fall_back_to_the_writer() {
        let pool = ConnectionPool::open_in_memory().unwrap();
        assert_eq!(pool.reader_count(), 0);
        pool.with_writer(seed).unwrap();
        assert_eq!(pool.with_reader(count_rows).unwrap(), 1);
    }

    #[test]
    fn file_backed_readers_see_committed_writes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pool.db");
        let pool = ConnectionPool::open(&path).unwrap();
        assert_eq!(pool.reader_count(), READER_RING_SIZE);
        pool.with_writer(|conn| {
            assert!(wal_active(conn)?);
            seed(conn)
        })
        .unwrap();
        // One full lap of the ring, every reader sees the write.
        for _ in 0..READER_RING_SIZE {
            assert_eq!(pool.with_reader(count_rows).unwrap(), 1);
        }
    }
}
