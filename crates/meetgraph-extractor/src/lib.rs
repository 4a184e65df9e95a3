//! Transcript-to-structured-data extraction (spec §4.5): one LLM call per
//! meeting against a strict schema, with a regex-based heuristic fallback
//! when every model in the chain fails. Ported from `extractor_enhanced.py`.

pub mod error;
pub mod fallback;
pub mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

use meetgraph_core::ExtractionResult;
use meetgraph_llm::{ChatMessage, ModelFallbackChain};
use tracing::{instrument, warn};

pub use error::{ExtractorError, ExtractorResult};
use schema::RawExtraction;

const MAX_OUTPUT_TOKENS: u32 = 20_000;
const EXTRACTION_TEMPERATURE: f32 = 0.3;

/// Headers carried by meetings ingested from email rather than a live
/// transcript (spec §3.6 supplement, ported from `extractor_enhanced.py`'s
/// optional `email_metadata` argument).
#[derive(Debug, Clone, Default)]
pub struct EmailMetadata {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<String>,
    pub subject: Option<String>,
}

/// Extracts structured meeting data from a raw transcript.
pub struct MeetingExtractor {
    chain: Arc<ModelFallbackChain>,
}

impl MeetingExtractor {
    pub fn new(chain: Arc<ModelFallbackChain>) -> Self {
        Self { chain }
    }

    /// Extracts memories, entities, relationships, and summary metadata
    /// from `transcript`. Falls back to [`fallback::basic_extraction`] if
    /// the LLM call or its response fails validation; only surfaces an
    /// error if the fallback itself produces nothing usable (spec §4.5:
    /// "an empty extraction is a hard failure surfaced to the caller").
    #[instrument(skip(self, transcript, known_entities, email_metadata), fields(transcript_len = transcript.len()))]
    pub async fn extract(
        &self,
        transcript: &str,
        known_entities: &[(String, String)],
        email_metadata: Option<&EmailMetadata>,
    ) -> ExtractorResult<ExtractionResult> {
        let result = match self.extract_via_llm(transcript, known_entities, email_metadata).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "llm extraction failed, falling back to heuristic extraction");
                fallback::basic_extraction(transcript, &err.to_string())
            }
        };

        if result.memories.is_empty() && result.entities.is_empty() {
            return Err(ExtractorError::EmptyExtraction);
        }
        Ok(result)
    }

    async fn extract_via_llm(
        &self,
        transcript: &str,
        known_entities: &[(String, String)],
        email_metadata: Option<&EmailMetadata>,
    ) -> ExtractorResult<ExtractionResult> {
        let messages = build_messages(transcript, known_entities, email_metadata);
        let (value, model) = self.chain.complete_json(&messages, EXTRACTION_TEMPERATURE, MAX_OUTPUT_TOKENS).await?;
        let raw: RawExtraction = serde_json::from_value(value).map_err(|e| ExtractorError::SchemaViolation(e.to_string()))?;
        tracing::debug!(model = %model, "extraction completed");
        Ok(raw.into_extraction_result())
    }
}

fn build_messages(transcript: &str, known_entities: &[(String, String)], email_metadata: Option<&EmailMetadata>) -> Vec<ChatMessage> {
    let system = format!(
        "You are a meeting-intelligence extraction engine. Read the transcript and \
         return ONLY a single JSON object matching this schema exactly — no prose, \
         no markdown fences, no extra keys:\n\n{}\n\n\
         Guidance:\n\
         - Extract every discrete fact as its own entry in `memories`.\n\
         - Every entity name in `entities` must be unique; merge repeated mentions.\n\
         - `type` on an entity must be one of the recognized entity types; if unsure \
           use \"person\" for people, \"project\" for initiatives, \"task\" for \
           individual work items.\n\
         - `current_state` captures only what this meeting actually asserts about the \
           entity right now — do not invent fields.\n\
         - Known entities from prior meetings are listed below; reuse their exact \
           names when the transcript refers to the same thing.",
        schema::json_schema_text()
    );

    let mut user = String::new();
    if !known_entities.is_empty() {
        user.push_str("Known entities from prior meetings:\n");
        user.push_str(&known_entities_block(known_entities));
        user.push('\n');
    }
    if let Some(email) = email_metadata {
        user.push_str("Email headers:\n");
        if let Some(from) = &email.from {
            user.push_str(&format!("From: {from}\n"));
        }
        if let Some(to) = &email.to {
            user.push_str(&format!("To: {to}\n"));
        }
        if let Some(date) = &email.date {
            user.push_str(&format!("Date: {date}\n"));
        }
        if let Some(subject) = &email.subject {
            user.push_str(&format!("Subject: {subject}\n"));
        }
        user.push('\n');
    }
    user.push_str("Transcript:\n");
    user.push_str(transcript);

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

fn known_entities_block(known_entities: &[(String, String)]) -> String {
    let mut by_type: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, entity_type) in known_entities {
        by_type.entry(entity_type.as_str()).or_default().push(name.as_str());
    }
    let mut out = String::new();
    for (entity_type, names) in by_type {
        out.push_str(&format!("- {entity_type}: {}\n", names.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_entities_block_groups_by_type() {
        let known = vec![
            ("Alice".to_string(), "person".to_string()),
            ("Bob".to_string(), "person".to_string()),
            ("Project Alpha".to_string(), "project".to_string()),
        ];
        let block = known_entities_block(&known);
        assert!(block.contains("person: Alice, Bob"));
        assert!(block.contains("project: Project Alpha"));
    }

    #[test]
    fn build_messages_embeds_schema_and_transcript() {
        let messages = build_messages("Alice: hello.", &[], None);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("\"properties\""));
        assert!(messages[1].content.contains("Alice: hello."));
    }

    #[test]
    fn build_messages_includes_email_headers() {
        let email = EmailMetadata { from: Some("a@x.com".to_string()), to: None, date: None, subject: Some("Sync".to_string()) };
        let messages = build_messages("content", &[], Some(&email));
        assert!(messages[1].content.contains("From: a@x.com"));
        assert!(messages[1].content.contains("Subject: Sync"));
    }
}
