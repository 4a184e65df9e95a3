//! Per-intent typed payload assembly (spec §4.7 step 4), ported from
//! `query_engine_v2`'s `_handle_timeline_query`, `_handle_blocker_query`,
//! `_handle_status_query`, `_handle_ownership_query`,
//! `_handle_relationship_query`, and `_handle_search_query`.

use std::collections::HashMap;

use meetgraph_storage::Store;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::{filter_entities_by_state, QueryContext};
use crate::error::QueryResult;

/// A handler's result: the JSON payload sent to answer synthesis, and the
/// entities it touched (for `QueryAnswer.entities_involved`).
pub struct HandlerOutput {
    pub payload: Value,
    pub entities_involved: Vec<Uuid>,
}

/// `display_limit` caps how many timeline entries are rendered per entity
/// (config key `timeline_display_limit`, most recent entries kept).
pub fn handle_timeline(context: &QueryContext, display_limit: usize) -> HandlerOutput {
    let mut timelines = Vec::new();
    for entity in &context.entities {
        let mut entries = context.timelines.get(&entity.id).cloned().unwrap_or_default();
        entries.sort_by_key(|e| e.transition.timestamp);
        if entries.len() > display_limit {
            entries = entries.split_off(entries.len() - display_limit);
        }
        let timeline: Vec<Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "date": entry.transition.timestamp,
                    "change": entry.transition.reason,
                    "from_state": entry.transition.from_state,
                    "to_state": entry.transition.to_state,
                    "changed_fields": entry.transition.changed_fields,
                    "meeting": entry.meeting_title,
                })
            })
            .collect();
        timelines.push(json!({
            "entity": entity.name,
            "type": entity.entity_type.as_str(),
            "timeline": timeline,
        }));
    }

    HandlerOutput {
        payload: json!(timelines),
        entities_involved: context.entities.iter().map(|e| e.id).collect(),
    }
}

pub fn handle_blocker(store: &Store, context: &QueryContext) -> QueryResult<HandlerOutput> {
    let scoped = if context.entities.is_empty() { None } else { Some(context.entities.clone()) };
    let filter = HashMap::from([("status".to_string(), json!("blocked"))]);
    let blocked_entities = filter_entities_by_state(store, &filter, scoped)?;

    let mut blockers = Vec::new();
    for entity in &blocked_entities {
        let current_blockers = store
            .get_entity_current_state(entity.id)?
            .and_then(|s| s.state.get("blockers").cloned())
            .unwrap_or(Value::Array(vec![]));

        let timeline = store.get_entity_timeline(entity.id)?;
        let resolution_history: Vec<Value> = timeline
            .iter()
            .filter(|entry| entry.transition.changed_fields.iter().any(|f| f == "blockers"))
            .map(|entry| {
                json!({
                    "date": entry.transition.timestamp,
                    "change": entry.transition.reason,
                    "from_blockers": entry.transition.from_state.as_ref().and_then(|s| s.get("blockers")).cloned().unwrap_or(Value::Array(vec![])),
                    "to_blockers": entry.transition.to_state.get("blockers").cloned().unwrap_or(Value::Array(vec![])),
                })
            })
            .collect();

        blockers.push(json!({
            "entity": entity.name,
            "type": entity.entity_type.as_str(),
            "current_blockers": current_blockers,
            "resolution_history": resolution_history,
        }));
    }

    Ok(HandlerOutput {
        payload: json!(blockers),
        entities_involved: blocked_entities.iter().map(|e| e.id).collect(),
    })
}

pub fn handle_status(context: &QueryContext) -> HandlerOutput {
    let mut statuses = Vec::new();
    for entity in &context.entities {
        let entries = context.timelines.get(&entity.id).cloned().unwrap_or_default();
        let current_state = entries.last().map(|e| json!(e.transition.to_state)).unwrap_or(json!({}));
        let last_updated = entries.last().map(|e| e.transition.timestamp);

        let mut recent: Vec<_> = entries.iter().collect();
        recent.sort_by(|a, b| b.transition.timestamp.cmp(&a.transition.timestamp));
        let recent_changes: Vec<Value> = recent
            .iter()
            .take(3)
            .map(|entry| {
                json!({
                    "date": entry.transition.timestamp,
                    "change": entry.transition.reason,
                    "fields": entry.transition.changed_fields,
                })
            })
            .collect();

        statuses.push(json!({
            "entity": entity.name,
            "type": entity.entity_type.as_str(),
            "current_state": current_state,
            "last_updated": last_updated,
            "recent_changes": recent_changes,
        }));
    }

    HandlerOutput {
        payload: json!(statuses),
        entities_involved: context.entities.iter().map(|e| e.id).collect(),
    }
}

pub fn handle_ownership(store: &Store, context: &QueryContext) -> QueryResult<HandlerOutput> {
    let entities_to_check = if !context.entities.is_empty() {
        context.entities.clone()
    } else {
        let filter = HashMap::from([("assigned_to".to_string(), json!({"$exists": true}))]);
        filter_entities_by_state(store, &filter, None)?
    };

    let mut ownership = Vec::new();
    for entity in &entities_to_check {
        let current_owner = store
            .get_entity_current_state(entity.id)?
            .and_then(|s| s.state.get("assigned_to").cloned());

        let timeline = store.get_entity_timeline(entity.id)?;
        let history: Vec<Value> = timeline
            .iter()
            .filter(|entry| entry.transition.changed_fields.iter().any(|f| f == "assigned_to"))
            .map(|entry| {
                json!({
                    "date": entry.transition.timestamp,
                    "from": entry.transition.from_state.as_ref().and_then(|s| s.get("assigned_to")).cloned(),
                    "to": entry.transition.to_state.get("assigned_to").cloned(),
                })
            })
            .collect();

        ownership.push(json!({
            "entity": entity.name,
            "type": entity.entity_type.as_str(),
            "current_owner": current_owner,
            "ownership_history": history,
        }));
    }

    Ok(HandlerOutput {
        payload: json!(ownership),
        entities_involved: entities_to_check.iter().map(|e| e.id).collect(),
    })
}

pub fn handle_relationship(context: &QueryContext) -> HandlerOutput {
    let mut relationship_data = Vec::new();
    for entity in &context.entities {
        let views = context.relationships.get(&entity.id).cloned().unwrap_or_default();
        let mut by_kind: HashMap<&'static str, Vec<Value>> = HashMap::new();
        for view in &views {
            let kind = view.relationship.relationship_type.as_str();
            by_kind.entry(kind).or_default().push(json!({
                "entity": view.to_name,
                "since": view.relationship.timestamp,
            }));
        }

        relationship_data.push(json!({
            "entity": entity.name,
            "type": entity.entity_type.as_str(),
            "relationships": by_kind,
        }));
    }

    HandlerOutput {
        payload: json!(relationship_data),
        entities_involved: context.entities.iter().map(|e| e.id).collect(),
    }
}

pub fn handle_search(context: &QueryContext) -> HandlerOutput {
    let top: Vec<&meetgraph_core::SearchResult> = context.memories.iter().take(10).collect();
    let relevant: Vec<Value> = top
        .iter()
        .map(|result| {
            json!({
                "content": result.memory.content,
                "meeting": result.meeting.title,
                "date": result.meeting.date,
                "score": result.score,
                "entities": result.relevant_entities.iter().map(|e| e.name.clone()).collect::<Vec<_>>(),
            })
        })
        .collect();

    let entities_involved = top.iter().flat_map(|r| r.relevant_entities.iter().map(|e| e.id)).collect();

    HandlerOutput { payload: json!(relevant), entities_involved }
}
