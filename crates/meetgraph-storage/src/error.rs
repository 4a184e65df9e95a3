use thiserror::Error;

/// Storage-layer error, folded into [`meetgraph_core::CoreError::PersistenceFailed`]
/// at the boundary of whichever crate calls into storage (spec §4.2: "partial
/// failure reported as an error").
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for meetgraph_core::CoreError {
    fn from(err: StorageError) -> Self {
        meetgraph_core::CoreError::PersistenceFailed(err.to_string())
    }
}
