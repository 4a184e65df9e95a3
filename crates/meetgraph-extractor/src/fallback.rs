//! Heuristic fallback extraction (spec §4.5, §7): entirely regex-based,
//! invoked only when every model in the LLM fallback chain fails. Ported
//! from `extractor_enhanced.py`'s `_basic_extraction` — guarantees at
//! least one memory and tags the result so callers can tell a degraded
//! extraction apart from a full one
//! (`metadata.extraction_method == "basic_fallback"`).

use std::collections::HashMap;

use meetgraph_core::{ActionItem, EntityType, ExtractedEntity, ExtractedMemory, ExtractedRelationship, ExtractionResult};
use regex::Regex;
use serde_json::Value;

const MAX_MEMORIES: usize = 50;
const MAX_ENTITIES: usize = 20;
const MAX_ACTION_ITEMS: usize = 10;

const STOPWORDS: &[&str] = &["The", "This", "That", "These", "Those"];

pub fn basic_extraction(transcript: &str, extraction_error: &str) -> ExtractionResult {
    let speaker_re = Regex::new(r"(?m)^([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\s*(?:\([^)]+\))?\s*:\s*(.+)$").expect("valid regex");

    let mut speakers: Vec<String> = Vec::new();
    let mut memories: Vec<ExtractedMemory> = Vec::new();
    for caps in speaker_re.captures_iter(transcript) {
        let speaker = caps[1].trim().to_string();
        let content = caps[2].trim();
        if !speakers.contains(&speaker) {
            speakers.push(speaker.clone());
        }
        if content.len() >= 30 {
            let truncated: String = content.chars().take(500).collect();
            memories.push(ExtractedMemory {
                content: truncated,
                speaker: Some(speaker),
                entity_mentions: Vec::new(),
                metadata: HashMap::from([("extraction_method".to_string(), Value::String("basic".to_string()))]),
            });
        }
    }
    memories.truncate(MAX_MEMORIES);

    let entity_re = Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\b").expect("valid regex");
    let mut mention_counts: HashMap<String, usize> = HashMap::new();
    for caps in entity_re.captures_iter(transcript) {
        let candidate = caps[1].to_string();
        if candidate.len() <= 3 {
            continue;
        }
        if speakers.contains(&candidate) {
            continue;
        }
        if STOPWORDS.contains(&candidate.as_str()) {
            continue;
        }
        *mention_counts.entry(candidate).or_insert(0) += 1;
    }

    let mut entities: Vec<ExtractedEntity> = mention_counts
        .iter()
        .filter(|(_, count)| **count >= 2)
        .map(|(name, count)| {
            let entity_type = guess_entity_type(name);
            ExtractedEntity {
                name: name.clone(),
                entity_type,
                current_state: HashMap::from([
                    ("mention_count".to_string(), Value::Number((*count as u64).into())),
                    ("extraction_method".to_string(), Value::String("basic".to_string())),
                ]),
            }
        })
        .collect();
    entities.sort_by(|a, b| a.name.cmp(&b.name));
    entities.truncate(MAX_ENTITIES);

    let action_items: Vec<ActionItem> = extract_action_items(transcript).into_iter().take(MAX_ACTION_ITEMS).collect();

    let mut topics: Vec<String> = mention_counts.iter().filter(|(_, count)| **count >= 3).map(|(name, _)| name.clone()).collect();
    topics.sort();
    if topics.is_empty() {
        topics.push("General Discussion".to_string());
    }

    if memories.is_empty() {
        let fallback_content: String = transcript.chars().take(500).collect();
        memories.push(ExtractedMemory {
            content: fallback_content,
            speaker: Some("Unknown".to_string()),
            entity_mentions: Vec::new(),
            metadata: HashMap::from([
                ("extraction_method".to_string(), Value::String("basic".to_string())),
                ("full_transcript".to_string(), Value::Bool(true)),
            ]),
        });
    }

    let mut metadata = HashMap::new();
    metadata.insert("extraction_method".to_string(), Value::String("basic_fallback".to_string()));
    metadata.insert("extraction_error".to_string(), Value::String(extraction_error.to_string()));
    metadata.insert(
        "warning".to_string(),
        Value::String("LLM extraction failed; falling back to regex-based heuristics".to_string()),
    );
    metadata.insert("transcript_length".to_string(), Value::Number((transcript.chars().count() as u64).into()));

    ExtractionResult {
        memories,
        entities,
        relationships: Vec::<ExtractedRelationship>::new(),
        meeting_title: "Untitled Meeting".to_string(),
        meeting_date: None,
        participants: speakers,
        summary: String::new(),
        topics,
        key_decisions: Vec::new(),
        action_items,
        metadata,
    }
}

fn guess_entity_type(name: &str) -> EntityType {
    let lower = name.to_lowercase();
    if ["api", "system", "app", "service"].iter().any(|kw| lower.contains(kw)) {
        EntityType::Feature
    } else if ["team", "department", "group"].iter().any(|kw| lower.contains(kw)) {
        EntityType::Team
    } else {
        EntityType::Project
    }
}

fn extract_action_items(transcript: &str) -> Vec<ActionItem> {
    let patterns = [
        r"(?i)(?:will|going to|need to|should|must)\s+(\w+\s+.{10,50})",
        r"(?i)(?:action|todo|task):\s*(.+?)(?:\.|$)",
        r"(?i)(?:I'll|We'll)\s+(.+?)(?:\.|$)",
    ];

    let mut items = Vec::new();
    for pattern in patterns {
        let re = Regex::new(pattern).expect("valid regex");
        for caps in re.captures_iter(transcript) {
            let description = caps[1].trim().to_string();
            if description.is_empty() {
                continue;
            }
            items.push(ActionItem {
                description,
                owner: Some("unassigned".to_string()),
                due_date: None,
                priority: None,
                status: Some("pending".to_string()),
            });
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarantees_at_least_one_memory() {
        let result = basic_extraction("no speaker lines here at all, just prose.", "timeout");
        assert!(!result.memories.is_empty());
    }

    #[test]
    fn tags_fallback_metadata() {
        let result = basic_extraction("Alice: We need to ship the migration by Friday.", "connection_error");
        assert_eq!(result.metadata.get("extraction_method"), Some(&Value::String("basic_fallback".to_string())));
        assert_eq!(result.metadata.get("extraction_error"), Some(&Value::String("connection_error".to_string())));
    }

    #[test]
    fn segments_speaker_lines_into_memories() {
        let transcript = "Alice: We are blocked on vendor access for the API migration project.\nBob: I will follow up with the vendor team today.";
        let result = basic_extraction(transcript, "parse_error");
        assert!(result.memories.iter().any(|m| m.speaker.as_deref() == Some("Alice")));
        assert!(result.participants.contains(&"Alice".to_string()));
        assert!(result.participants.contains(&"Bob".to_string()));
    }

    #[test]
    fn repeated_capitalized_phrase_becomes_entity() {
        let transcript = "Alice: The Payment Gateway needs review. Bob: Payment Gateway looks ready. Alice: Payment Gateway ships Friday.";
        let result = basic_extraction(transcript, "http_error");
        assert!(result.entities.iter().any(|e| e.name == "Payment Gateway"));
    }

    #[test]
    fn empty_transcript_falls_back_to_truncated_full_text() {
        let result = basic_extraction("", "unknown_error");
        assert_eq!(result.memories.len(), 1);
        assert_eq!(result.memories[0].speaker.as_deref(), Some("Unknown"));
    }
}
