//! The last-resort LLM resolution strategy (spec §4.3), ported from
//! `entity_resolver.py`'s `_resolve_with_llm`: present the model a bounded
//! catalog and every still-unresolved query term in one call, and ask for
//! an entity id (or `null`) per term.

use std::collections::HashMap;

use meetgraph_core::Entity;
use meetgraph_llm::{ChatMessage, ModelFallbackChain};
use serde_json::json;
use uuid::Uuid;

/// Catalog entries beyond this are dropped before the prompt is built, so
/// the call stays within context even for large entity populations (spec
/// §4.3: "catalog capped at 200 entities").
pub const MAX_CATALOG_SIZE: usize = 200;

/// One term's LLM verdict: `entity_id: None` means the model looked and
/// found nothing confident enough to report.
#[derive(Debug, Clone)]
pub struct LlmMatchOutcome {
    pub entity_id: Option<Uuid>,
    pub confidence: f32,
}

pub async fn resolve_via_llm(
    chain: &ModelFallbackChain,
    terms: &[String],
    catalog: &[Entity],
) -> meetgraph_llm::LlmResult<HashMap<String, LlmMatchOutcome>> {
    let bounded_catalog: Vec<&Entity> = catalog.iter().take(MAX_CATALOG_SIZE).collect();
    let catalog_json: Vec<_> = bounded_catalog
        .iter()
        .map(|e| json!({"id": e.id, "name": e.name, "type": e.entity_type.as_str()}))
        .collect();

    let messages = vec![
        ChatMessage::system(
            "You resolve free-text entity mentions from a meeting transcript against a \
             known catalog of entities. For each query term, decide which catalog entity \
             (by id) it most likely refers to, or report no match if none fit confidently. \
             Respond with a strict JSON array, one object per query term, each shaped \
             exactly as: {\"query_term\": <string>, \"entity_id\": <uuid string or null>, \
             \"confidence\": <float between 0 and 1>}.",
        ),
        ChatMessage::user(format!(
            "Catalog:\n{}\n\nQuery terms:\n{}",
            serde_json::to_string(&catalog_json).unwrap_or_default(),
            serde_json::to_string(terms).unwrap_or_default(),
        )),
    ];

    let (value, _model) = chain.complete_json(&messages, 0.0, 2000).await?;
    Ok(parse_llm_response(&value, terms, &bounded_catalog))
}

fn parse_llm_response(value: &serde_json::Value, terms: &[String], catalog: &[&Entity]) -> HashMap<String, LlmMatchOutcome> {
    let mut out = HashMap::new();
    let Some(array) = value.as_array() else {
        return out;
    };

    for item in array {
        let Some(query_term) = item.get("query_term").and_then(|v| v.as_str()) else {
            continue;
        };
        let confidence = item.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
        let confidence = confidence.clamp(0.0, 1.0);

        let entity_id = item
            .get("entity_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .filter(|id| catalog.iter().any(|e| e.id == *id));

        out.insert(query_term.to_string(), LlmMatchOutcome { entity_id, confidence });
    }

    // Any term the model silently dropped from its array counts as no match
    // rather than being treated as unresolved LLM failure.
    for term in terms {
        out.entry(term.clone()).or_insert(LlmMatchOutcome { entity_id: None, confidence: 0.0 });
    }
    out
}
