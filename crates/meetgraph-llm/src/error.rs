use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),

    #[error("failed to parse model output: {0}")]
    Parse(String),

    #[error("all models in the fallback chain failed")]
    AllModelsFailed,
}

pub type LlmResult<T> = Result<T, LlmError>;

impl From<LlmError> for meetgraph_core::CoreError {
    fn from(err: LlmError) -> Self {
        meetgraph_core::CoreError::LLMUnavailable(err.to_string())
    }
}
