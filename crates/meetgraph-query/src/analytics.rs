//! Analytics query payload (spec §4.7 step 4), narrowed to the three
//! metrics `meetgraph-storage` actually exposes: entity-type counts,
//! relationship-type counts, and a state-change-by-date histogram (see
//! `query_engine_v2._handle_analytics_query` and
//! `storage.get_analytics_data` in the original).

use serde_json::{json, Value};

use crate::error::QueryResult;
use meetgraph_storage::Store;

pub fn handle_analytics(store: &Store) -> QueryResult<Value> {
    let entity_counts = store.analytics_entity_counts()?;
    let relationship_counts = store.analytics_relationship_counts()?;
    let state_changes_by_date = store.analytics_state_changes_by_date()?;

    Ok(json!({
        "entity_counts": entity_counts,
        "relationship_counts": relationship_counts,
        "state_changes_by_date": state_changes_by_date,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_core::{Entity, EntityType};
    use uuid::Uuid;

    #[test]
    fn returns_all_three_metrics_as_empty_maps_with_no_data() {
        let dir = std::env::temp_dir().join(format!("meetgraph-query-analytics-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = Store::open(dir.join("relational.redb"), dir.join("vectors.redb")).unwrap();

        let payload = handle_analytics(&store).unwrap();
        assert!(payload["entity_counts"].as_object().unwrap().is_empty());
        assert!(payload["relationship_counts"].as_object().unwrap().is_empty());
        assert!(payload["state_changes_by_date"].as_object().unwrap().is_empty());
    }

    #[test]
    fn counts_entities_by_type() {
        let dir = std::env::temp_dir().join(format!("meetgraph-query-analytics-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = Store::open(dir.join("relational.redb"), dir.join("vectors.redb")).unwrap();
        store
            .save_entities(&[Entity::new(EntityType::Project, "Alpha"), Entity::new(EntityType::Person, "Alice")])
            .unwrap();

        let payload = handle_analytics(&store).unwrap();
        assert_eq!(payload["entity_counts"]["project"], 1);
        assert_eq!(payload["entity_counts"]["person"], 1);
    }
}
