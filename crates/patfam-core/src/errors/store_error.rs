/// Storage-layer errors for SQLite operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("version race on family {family_id}: expected {expected}, found {actual}")]
    VersionRace {
        family_id: String,
        expected: u64,
        actual: u64,
    },
}

impl StoreError {
    /// Whether the caller should re-merge from the latest stored version
    /// and retry the materialization.
    pub fn is_race(&self) -> bool {
        matches!(self, StoreError::VersionRace { .. })
    }
}
