/// Ingest-boundary errors. A malformed record is rejected without
/// affecting any other record; the rejection is logged with the
/// offending key so no fetched record disappears silently.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IngestError {
    #[error("malformed record {key}: field {field}: {reason}")]
    MalformedRecord {
        key: String,
        field: String,
        reason: String,
    },
}
