//! Stage 6 (spec §4.6): reason refinement for transitions the comparator
//! left without one. Ported from `processor_v2.py`'s
//! `_generate_transition_reason`/`_generate_fallback_reason`.

use std::collections::{BTreeSet, HashMap};

use meetgraph_llm::{ChatMessage, LlmProcessor};
use serde_json::Value;
use tracing::warn;

const REASON_TEMPERATURE: f32 = 0.1;
const REASON_MAX_TOKENS: u32 = 250;

/// Asks a small LLM call to summarize a state change in one sentence;
/// falls back to a rule-based reason built from the field deltas if the
/// call fails or returns something unparsable.
pub async fn refine_reason(
    llm_processor: &LlmProcessor,
    from_state: Option<&HashMap<String, Value>>,
    to_state: &HashMap<String, Value>,
    meeting_summary: &str,
) -> String {
    let prompt = format!(
        "Analyze the state transition and the meeting summary to generate a concise, \
         human-readable reason for the change.\n\n\
         Previous State:\n{}\n\n\
         New State:\n{}\n\n\
         Meeting Summary:\n{}\n\n\
         Instructions:\n\
         1. Summarize the key change (e.g., status change, new assignment, progress update).\n\
         2. Be brief and clear. If multiple things changed, focus on the most significant one.\n\
         3. Respond with a JSON object containing a \"reason\" field.",
        from_state.map(|s| serde_json::to_string_pretty(s).unwrap_or_default()).unwrap_or_else(|| "null".to_string()),
        serde_json::to_string_pretty(to_state).unwrap_or_default(),
        if meeting_summary.is_empty() { "No summary available." } else { meeting_summary },
    );

    let messages = vec![
        ChatMessage::system(
            "You are a system that analyzes state changes and provides clear, concise reasons. \
             Always respond with valid JSON containing a 'reason' field.",
        ),
        ChatMessage::user(prompt),
    ];

    match llm_processor.complete_json(&messages, REASON_TEMPERATURE, REASON_MAX_TOKENS).await {
        Ok((value, _model)) => match value.get("reason").and_then(Value::as_str) {
            Some(reason) if !reason.trim().is_empty() => reason.to_string(),
            _ => generate_fallback_reason(from_state, to_state),
        },
        Err(err) => {
            warn!(error = %err, "llm call for transition reason failed, using rule-based reason");
            generate_fallback_reason(from_state, to_state)
        }
    }
}

/// Rule-based reason generation ported verbatim from
/// `processor_v2.py`'s `_generate_fallback_reason`.
pub fn generate_fallback_reason(from_state: Option<&HashMap<String, Value>>, to_state: &HashMap<String, Value>) -> String {
    let Some(from_state) = from_state else {
        let status = to_state.get("status").and_then(Value::as_str).unwrap_or("unknown");
        return format!("Initial state captured: {status}");
    };

    let mut reasons = Vec::new();

    let old_status = from_state.get("status");
    let new_status = to_state.get("status");
    if old_status != new_status {
        reasons.push(format!(
            "Status changed from {} to {}",
            display_value(old_status),
            display_value(new_status)
        ));
    }

    let old_progress = from_state.get("progress");
    let new_progress = to_state.get("progress");
    if old_progress != new_progress {
        reasons.push(format!("Progress updated to {}", display_value(new_progress)));
    }

    let old_owner = from_state.get("assigned_to");
    let new_owner = to_state.get("assigned_to");
    if old_owner != new_owner {
        reasons.push(format!("Assigned to {}", display_value(new_owner)));
    }

    let old_blockers = value_set(from_state.get("blockers"));
    let new_blockers = value_set(to_state.get("blockers"));
    if old_blockers != new_blockers {
        let added: Vec<&String> = new_blockers.difference(&old_blockers).collect();
        let removed: Vec<&String> = old_blockers.difference(&new_blockers).collect();
        if !added.is_empty() {
            reasons.push(format!("New blockers: {}", join(&added)));
        }
        if !removed.is_empty() {
            reasons.push(format!("Resolved blockers: {}", join(&removed)));
        }
    }

    if reasons.is_empty() {
        "State updated".to_string()
    } else {
        reasons.join("; ")
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "none".to_string(),
    }
}

fn value_set(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(ToString::to_string)).collect())
        .unwrap_or_default()
}

fn join(values: &[&String]) -> String {
    values.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initial_capture_reason_names_status() {
        let to_state = HashMap::from([("status".to_string(), json!("planned"))]);
        assert_eq!(generate_fallback_reason(None, &to_state), "Initial state captured: planned");
    }

    #[test]
    fn status_change_is_described() {
        let from = HashMap::from([("status".to_string(), json!("planned"))]);
        let to = HashMap::from([("status".to_string(), json!("in_progress"))]);
        let reason = generate_fallback_reason(Some(&from), &to);
        assert_eq!(reason, "Status changed from planned to in_progress");
    }

    #[test]
    fn blocker_additions_and_removals_are_described() {
        let from = HashMap::from([("blockers".to_string(), json!(["legal"]))]);
        let to = HashMap::from([("blockers".to_string(), json!(["vendor"]))]);
        let reason = generate_fallback_reason(Some(&from), &to);
        assert!(reason.contains("New blockers: vendor"));
        assert!(reason.contains("Resolved blockers: legal"));
    }

    #[test]
    fn no_change_yields_generic_reason() {
        let from = HashMap::from([("status".to_string(), json!("planned"))]);
        let to = from.clone();
        assert_eq!(generate_fallback_reason(Some(&from), &to), "State updated");
    }
}
