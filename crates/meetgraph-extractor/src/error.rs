use meetgraph_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("llm call failed: {0}")]
    Llm(#[from] meetgraph_llm::LlmError),
    #[error("extraction response failed schema validation: {0}")]
    SchemaViolation(String),
    #[error("extraction produced no memories and no entities")]
    EmptyExtraction,
}

pub type ExtractorResult<T> = Result<T, ExtractorError>;

impl From<ExtractorError> for CoreError {
    fn from(err: ExtractorError) -> Self {
        CoreError::ExtractionFailed(err.to_string())
    }
}
