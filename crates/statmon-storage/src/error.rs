/// Errors surfaced by the storage layer.
///
/// `NotFound` is the only variant callers are expected to match on; the rest
/// wrap their sources for context. Connection-class database errors are
/// retried inside the db backend and never escape as a distinct kind.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The named metric has never been written on this backend.
    #[error("metric {0:?} not found")]
    NotFound(String),

    /// An underlying database error, after any retry schedule ran dry.
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Snapshot file I/O failure.
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failure, e.g. a corrupt file on restore.
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
