//! The strict JSON schema the extractor asks the model to follow, derived
//! from this module's DTOs via `schemars` so the prompt's schema and the
//! parse target can never drift (spec §3.6, port of `extractor_enhanced.py`'s
//! `json_schema`/"meeting_notes").

use std::collections::HashMap;

use meetgraph_core::{ActionItem, EntityType, ExtractedEntity, ExtractedMemory, ExtractedRelationship, ExtractionResult};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawExtraction {
    pub meeting_title: String,
    #[serde(default)]
    pub meeting_date: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<RawActionItem>,
    #[serde(default)]
    pub metadata: RawMeetingMetadata,
    #[serde(default)]
    pub memories: Vec<RawMemory>,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub relationships: Vec<RawRelationship>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct RawMeetingMetadata {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub follow_up_required: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawActionItem {
    pub description: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct RawMemoryMetadata {
    #[serde(default, rename = "type")]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub importance: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawMemory {
    pub content: String,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub metadata: RawMemoryMetadata,
    #[serde(default)]
    pub entity_mentions: Vec<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct RawEntityState {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
}

impl RawEntityState {
    fn into_map(self) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        if let Some(v) = self.status {
            out.insert("status".to_string(), Value::String(v));
        }
        if let Some(v) = self.assigned_to {
            out.insert("assigned_to".to_string(), Value::String(v));
        }
        if let Some(v) = self.deadline {
            out.insert("deadline".to_string(), Value::String(v));
        }
        if let Some(v) = self.progress {
            out.insert("progress".to_string(), Value::String(v));
        }
        if !self.blockers.is_empty() {
            out.insert(
                "blockers".to_string(),
                Value::Array(self.blockers.into_iter().map(Value::String).collect()),
            );
        }
        out
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub current_state: RawEntityState,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawRelationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
}

impl RawExtraction {
    pub fn into_extraction_result(self) -> ExtractionResult {
        let mut memories: Vec<ExtractedMemory> = self
            .memories
            .into_iter()
            .map(|m| ExtractedMemory {
                content: m.content,
                speaker: m.speaker,
                entity_mentions: m.entity_mentions,
                metadata: memory_metadata_map(m.metadata),
            })
            .collect();

        // Mirrors `extractor_enhanced.py`'s `_convert_to_extraction_result`:
        // every key decision also becomes a searchable memory.
        for decision in &self.key_decisions {
            memories.push(ExtractedMemory {
                content: format!("Decision: {decision}"),
                speaker: None,
                entity_mentions: Vec::new(),
                metadata: HashMap::from([
                    ("type".to_string(), Value::String("decision".to_string())),
                    ("importance".to_string(), Value::String("high".to_string())),
                ]),
            });
        }

        let entities: Vec<ExtractedEntity> = self
            .entities
            .into_iter()
            .filter_map(|e| match EntityType::parse(&e.entity_type) {
                Some(entity_type) => Some(ExtractedEntity {
                    name: e.name,
                    entity_type,
                    current_state: e.current_state.into_map(),
                }),
                None => {
                    warn!(entity_type = %e.entity_type, name = %e.name, "dropping extracted entity with unrecognized type");
                    None
                }
            })
            .collect();

        let relationships: Vec<ExtractedRelationship> = self
            .relationships
            .into_iter()
            .map(|r| ExtractedRelationship {
                from: r.from,
                to: r.to,
                relationship_type: r.relationship_type,
                attributes: HashMap::new(),
            })
            .collect();

        let action_items: Vec<ActionItem> = self
            .action_items
            .into_iter()
            .map(|a| ActionItem {
                description: a.description,
                owner: a.owner,
                due_date: a.due_date,
                priority: a.priority,
                status: a.status,
            })
            .collect();

        let mut topics = self.metadata.topics;
        topics.extend(self.metadata.projects.iter().cloned());

        let mut metadata = HashMap::new();
        metadata.insert("extraction_method".to_string(), Value::String("llm".to_string()));
        if !self.metadata.risks.is_empty() {
            metadata.insert(
                "risks".to_string(),
                Value::Array(self.metadata.risks.into_iter().map(Value::String).collect()),
            );
        }
        metadata.insert("follow_up_required".to_string(), Value::Bool(self.metadata.follow_up_required));

        ExtractionResult {
            memories,
            entities,
            relationships,
            meeting_title: self.meeting_title,
            meeting_date: self.meeting_date,
            participants: self.participants,
            summary: self.executive_summary,
            topics,
            key_decisions: self.key_decisions,
            action_items,
            metadata,
        }
    }
}

fn memory_metadata_map(meta: RawMemoryMetadata) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    if let Some(t) = meta.memory_type {
        out.insert("type".to_string(), Value::String(t));
    }
    if let Some(i) = meta.importance {
        out.insert("importance".to_string(), Value::String(i));
    }
    out
}

/// The schema text embedded in the extraction prompt (spec §3.6: "`schemars`
/// derives the JSON schema from the Rust `RawExtraction` DTO so the schema
/// sent to the model and the parse target can't drift").
pub fn json_schema_text() -> String {
    let schema = schemars::schema_for!(RawExtraction);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_entity_type_is_dropped() {
        let raw = RawExtraction {
            meeting_title: "Sync".to_string(),
            meeting_date: None,
            participants: vec![],
            executive_summary: String::new(),
            key_decisions: vec![],
            action_items: vec![],
            metadata: RawMeetingMetadata::default(),
            memories: vec![],
            entities: vec![
                RawEntity { name: "Widget".to_string(), entity_type: "gadget".to_string(), current_state: RawEntityState::default() },
                RawEntity { name: "Alice".to_string(), entity_type: "person".to_string(), current_state: RawEntityState::default() },
            ],
            relationships: vec![],
        };
        let result = raw.into_extraction_result();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].name, "Alice");
    }

    #[test]
    fn key_decisions_become_memories() {
        let raw = RawExtraction {
            meeting_title: "Sync".to_string(),
            meeting_date: None,
            participants: vec![],
            executive_summary: String::new(),
            key_decisions: vec!["Ship v2 next week".to_string()],
            action_items: vec![],
            metadata: RawMeetingMetadata::default(),
            memories: vec![],
            entities: vec![],
            relationships: vec![],
        };
        let result = raw.into_extraction_result();
        assert_eq!(result.memories.len(), 1);
        assert!(result.memories[0].content.contains("Ship v2 next week"));
    }

    #[test]
    fn schema_text_is_valid_json() {
        let text = json_schema_text();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert!(parsed.get("properties").is_some());
    }
}
