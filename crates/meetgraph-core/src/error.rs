use thiserror::Error;

/// The closed error taxonomy exposed to callers of the core pipeline.
///
/// Component-local errors (storage backend errors, HTTP errors, JSON parse
/// errors) are folded into one of these variants at the public boundary of
/// the crate that produced them; they are never matched on by name deeper in
/// the pipeline, only by variant.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("entity resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("llm unavailable: {0}")]
    LLMUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
