//! Answer synthesis and follow-up suggestions (spec §4.7 steps 5-6), ported
//! from `query_engine_v2`'s `_generate_*_response` prompt builders and
//! `_generate_follow_up_suggestions`.

use meetgraph_core::IntentKind;
use meetgraph_llm::{ChatMessage, LlmProcessor};
use serde_json::Value;

use crate::context::QueryContext;

const SYSTEM_PROMPT: &str = "You are a meeting knowledge graph analyst. Answer business questions about \
tracked entities using only the structured data provided. Be specific and concise.";

/// Confidence assigned to the templated fallback when the LLM call fails or
/// returns a response that doesn't match the `{answer, confidence}` schema
/// (spec §7: "return a templated fallback answer with lowered confidence").
const FALLBACK_CONFIDENCE: f32 = 0.3;

/// Sends `payload` plus the original query to the LLM with intent-specific
/// instructions, requiring a JSON `{answer, confidence}` reply. Falls back
/// to a deterministic templated answer built from the payload on any LLM
/// failure or malformed reply.
pub async fn synthesize_answer(llm: &LlmProcessor, context: &QueryContext, payload: &Value) -> (String, f32) {
    let prompt = build_prompt(context.intent.intent_type, &context.query, payload);
    let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

    match llm.complete_json(&messages, 0.3, 800).await {
        Ok((value, _raw)) => {
            let answer = value.get("answer").and_then(Value::as_str).map(str::to_string);
            let confidence = value.get("confidence").and_then(Value::as_f64).map(|c| c as f32);
            match (answer, confidence) {
                (Some(answer), Some(confidence)) => (answer, confidence.clamp(0.0, 1.0)),
                _ => fallback_answer(context.intent.intent_type, payload),
            }
        }
        Err(_) => fallback_answer(context.intent.intent_type, payload),
    }
}

fn build_prompt(intent: IntentKind, query: &str, payload: &Value) -> String {
    let instructions = match intent {
        IntentKind::Timeline => {
            "1. Describe the progression chronologically.\n\
             2. Call out the most significant transitions and their reasons.\n\
             3. Note any gaps or periods with no recorded change."
        }
        IntentKind::Blocker => {
            "1. List all current blockers clearly.\n\
             2. Show resolution history for blockers that were later cleared.\n\
             3. Identify any recurring patterns across blockers."
        }
        IntentKind::Status => {
            "1. Summarize the current state of each entity concisely.\n\
             2. Mention the most recent change and when it happened."
        }
        IntentKind::Ownership => {
            "1. State who currently owns or is assigned to each entity.\n\
             2. Note any ownership changes from the history."
        }
        IntentKind::Analytics => {
            "1. Summarize the counts and distributions in plain language.\n\
             2. Call out the largest categories."
        }
        IntentKind::Relationship => {
            "1. Describe how the mentioned entities relate to one another.\n\
             2. Group relationships by type."
        }
        IntentKind::Search => {
            "1. Summarize what the retrieved mentions say about the query.\n\
             2. Cite which meetings they came from."
        }
    };

    format!(
        "Based on the data below, answer this query: {query}\n\n\
         Data:\n{}\n\n\
         Instructions:\n{instructions}\n\n\
         You MUST respond with valid JSON in this exact format:\n\
         {{\"answer\": \"your comprehensive answer here\", \"confidence\": 0.0}}",
        serde_json::to_string_pretty(payload).unwrap_or_default(),
    )
}

fn fallback_answer(intent: IntentKind, payload: &Value) -> (String, f32) {
    let count = payload.as_array().map(Vec::len).unwrap_or(0);
    let answer = match intent {
        IntentKind::Timeline => format!("Found timeline data for {count} entit{}.", plural(count)),
        IntentKind::Blocker => format!("Found {count} currently blocked entit{}.", plural(count)),
        IntentKind::Status => format!("Retrieved current status for {count} entit{}.", plural(count)),
        IntentKind::Ownership => format!("Found ownership records for {count} entit{}.", plural(count)),
        IntentKind::Analytics => "Analytics summary computed from storage counts.".to_string(),
        IntentKind::Relationship => format!("Found relationship data for {count} entit{}.", plural(count)),
        IntentKind::Search => format!("Found {count} relevant mention{}.", if count == 1 { "" } else { "s" }),
    };
    (answer, FALLBACK_CONFIDENCE)
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}

/// Deterministic next-question templates per intent (spec §2 supplement,
/// ported from `_generate_follow_up_suggestions` and extended to the
/// intents the original left out). Capped at 3 suggestions.
pub fn generate_follow_ups(context: &QueryContext) -> Vec<String> {
    let mut suggestions = Vec::new();
    let first_entity_name = context.entities.first().map(|e| e.name.as_str());

    match context.intent.intent_type {
        IntentKind::Timeline => {
            for entity in &context.entities {
                suggestions.push(format!("What factors influenced {}'s progress?", entity.name));
                suggestions.push(format!("Who was involved in {} at each stage?", entity.name));
            }
            suggestions.push("What caused the biggest change?".to_string());
        }
        IntentKind::Blocker => {
            suggestions.push("What patterns do we see in blockers?".to_string());
            suggestions.push("Which teams or projects have the most blockers?".to_string());
            suggestions.push(match first_entity_name {
                Some(name) => format!("Who can unblock {name}?"),
                None => "Who can unblock these items?".to_string(),
            });
        }
        IntentKind::Status => {
            for entity in &context.entities {
                suggestions.push(format!("What's the timeline for {}?", entity.name));
                suggestions.push(format!("What are the dependencies for {}?", entity.name));
            }
            suggestions.push("What changed since last week?".to_string());
        }
        IntentKind::Ownership => {
            suggestions.push(match first_entity_name {
                Some(name) => format!("What else does {name} own?"),
                None => "What else does this owner own?".to_string(),
            });
        }
        IntentKind::Analytics => {
            suggestions.push("Break this down by team?".to_string());
        }
        IntentKind::Relationship => {
            suggestions.push(match first_entity_name {
                Some(name) => format!("What depends on {name}?"),
                None => "What depends on these entities?".to_string(),
            });
        }
        IntentKind::Search => {
            suggestions.push("Narrow this to a specific entity?".to_string());
        }
    }

    suggestions.truncate(3);
    suggestions
}
