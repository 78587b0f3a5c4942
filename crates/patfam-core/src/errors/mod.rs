//! Error taxonomy for the pipeline, one enum per failure family.

mod crawl_error;
mod ingest_error;
mod store_error;

pub use crawl_error::CrawlError;
pub use ingest_error::IngestError;
pub use store_error::StoreError;

/// Result alias used throughout the workspace.
pub type PatfamResult<T> = Result<T, PatfamError>;

/// Top-level error aggregating every subsystem's failure family.
#[derive(Debug, thiserror::Error)]
pub enum PatfamError {
    #[error("crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {reason}")]
    Config { reason: String },
}

impl PatfamError {
    /// Build a config error from anything displayable.
    pub fn config(reason: impl std::fmt::Display) -> Self {
        Self::Config {
            reason: reason.to_string(),
        }
    }
}
