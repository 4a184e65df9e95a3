//! Stage 9 (spec §4.6): validation metrics computed from one processing
//! run. Recorded, not raised — a failed consistency check is logged and
//! carried in the returned summary, never turned into a processing error
//! (ported from `processor_v2.py`'s `_validate_state_tracking`).

use std::collections::{HashMap, HashSet};

use meetgraph_core::{Entity, EntityState, StateTransition};
use meetgraph_llm::deterministic_diff;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// Completeness and consistency metrics for one `process_meeting` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationMetrics {
    pub entities_processed: usize,
    pub states_captured: usize,
    pub transitions_created: usize,
    pub consistency_errors: Vec<String>,
    pub no_state_entity_ids: Vec<Uuid>,
}

/// Recomputes each transition's field-wise diff from its own
/// `from_state`/`to_state` and flags disagreement with the stored
/// `changed_fields` (a transition whose reason came from the LLM comparator
/// may legitimately ignore a semantic no-op the recomputed diff still
/// flags — this is a logged signal, not proof of a bug). Also flags any
/// entity this run touched that ended up with neither a prior nor a new
/// state.
pub fn validate(
    entity_map: &HashMap<String, Entity>,
    prior_states: &HashMap<Uuid, Option<EntityState>>,
    new_states: &[EntityState],
    transitions: &[StateTransition],
) -> ValidationMetrics {
    let mut consistency_errors = Vec::new();
    for transition in transitions {
        let recomputed: HashSet<String> = match &transition.from_state {
            Some(from) => deterministic_diff(from, &transition.to_state).changed_fields.into_iter().collect(),
            None => transition.to_state.keys().cloned().collect(),
        };
        let stored: HashSet<String> = transition.changed_fields.iter().cloned().collect();
        if recomputed != stored {
            let message = format!(
                "entity {}: transition {} changed_fields {:?} disagrees with recomputed diff {:?}",
                transition.entity_id, transition.id, transition.changed_fields, recomputed
            );
            warn!("{message}");
            consistency_errors.push(message);
        }
    }

    let has_new_state: HashSet<Uuid> = new_states.iter().map(|s| s.entity_id).collect();
    let mut no_state_entity_ids = Vec::new();
    for entity in entity_map.values() {
        let had_prior = prior_states.get(&entity.id).map(|p| p.is_some()).unwrap_or(false);
        if !had_prior && !has_new_state.contains(&entity.id) {
            warn!(entity_id = %entity.id, "entity has neither a new state nor any prior state");
            no_state_entity_ids.push(entity.id);
        }
    }

    ValidationMetrics {
        entities_processed: entity_map.len(),
        states_captured: new_states.len(),
        transitions_created: transitions.len(),
        consistency_errors,
        no_state_entity_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use meetgraph_core::EntityType;
    use serde_json::json;

    fn entity() -> Entity {
        Entity::new(EntityType::Project, "Project Alpha")
    }

    #[test]
    fn agreeing_transition_yields_no_consistency_error() {
        let e = entity();
        let mut entity_map = HashMap::new();
        entity_map.insert("Project Alpha".to_string(), e.clone());

        let transition = StateTransition {
            id: Uuid::new_v4(),
            entity_id: e.id,
            from_state: Some(HashMap::from([("status".to_string(), json!("planned"))])),
            to_state: HashMap::from([("status".to_string(), json!("blocked"))]),
            changed_fields: vec!["status".to_string()],
            reason: "status changed".to_string(),
            meeting_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };

        let new_state = EntityState {
            id: Uuid::new_v4(),
            entity_id: e.id,
            state: transition.to_state.clone(),
            meeting_id: transition.meeting_id,
            timestamp: Utc::now(),
            confidence: 0.9,
        };

        let metrics = validate(&entity_map, &HashMap::new(), &[new_state], std::slice::from_ref(&transition));
        assert!(metrics.consistency_errors.is_empty());
        assert_eq!(metrics.transitions_created, 1);
    }

    #[test]
    fn disagreeing_changed_fields_is_flagged() {
        let e = entity();
        let mut entity_map = HashMap::new();
        entity_map.insert("Project Alpha".to_string(), e.clone());

        let transition = StateTransition {
            id: Uuid::new_v4(),
            entity_id: e.id,
            from_state: Some(HashMap::from([("status".to_string(), json!("planned"))])),
            to_state: HashMap::from([("status".to_string(), json!("blocked"))]),
            changed_fields: vec!["progress".to_string()],
            reason: "wrong field recorded".to_string(),
            meeting_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };

        let metrics = validate(&entity_map, &HashMap::new(), &[], std::slice::from_ref(&transition));
        assert_eq!(metrics.consistency_errors.len(), 1);
    }

    #[test]
    fn entity_with_neither_prior_nor_new_state_is_flagged() {
        let e = entity();
        let mut entity_map = HashMap::new();
        entity_map.insert("Project Alpha".to_string(), e.clone());

        let metrics = validate(&entity_map, &HashMap::new(), &[], &[]);
        assert_eq!(metrics.no_state_entity_ids, vec![e.id]);
    }
}
