use meetgraph_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("storage error: {0}")]
    Storage(#[from] meetgraph_storage::StorageError),

    #[error("resolution error: {0}")]
    Resolution(#[from] CoreError),
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;

impl From<ProcessorError> for CoreError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::Storage(e) => CoreError::PersistenceFailed(e.to_string()),
            ProcessorError::Resolution(e) => e,
        }
    }
}
