use meetgraph_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("storage error: {0}")]
    Storage(#[from] meetgraph_storage::StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

pub type QueryResult<T> = Result<T, QueryError>;

impl From<QueryError> for CoreError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Storage(e) => CoreError::PersistenceFailed(e.to_string()),
            QueryError::Core(e) => e,
        }
    }
}
