//! Relational half of the store (spec §4.2): Meetings, Memories, Entities,
//! EntityStates, StateTransitions, EntityRelationships, persisted in a
//! single [`redb`] database file with a write-through secondary index per
//! entity/relationship, the same split the original source's memory index
//! uses between the JSONL event log and its redb cache (ported here from
//! `aigent-memory`'s `MemoryIndex`, minus the event log — redb is already
//! durable, so there is nothing else to reconstruct from).

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use meetgraph_core::{Entity, EntityRelationship, EntityState, EntityType, Meeting, Memory, StateTransition};
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

const MEETINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("meetings");
const MEMORIES: TableDefinition<&str, &[u8]> = TableDefinition::new("memories");
const ENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entities");
/// `"normalized_name\u{0}type" -> entity_id`, the natural key from spec §9.
const ENTITY_KEY_INDEX: TableDefinition<&str, &str> = TableDefinition::new("entity_key_index");
/// `"all" | type_slug -> newline-separated entity ids`, insertion ordered.
const ENTITY_LIST_INDEX: TableDefinition<&str, &str> = TableDefinition::new("entity_list_index");
const ENTITY_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("entity_states");
const STATES_BY_ENTITY: TableDefinition<&str, &str> = TableDefinition::new("states_by_entity");
const TRANSITIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transitions");
const TRANSITIONS_BY_ENTITY: TableDefinition<&str, &str> = TableDefinition::new("transitions_by_entity");
const RELATIONSHIPS: TableDefinition<&str, &[u8]> = TableDefinition::new("relationships");
/// `"from\u{0}to\u{0}type\u{0}active" -> relationship_id`, spec §3 dedup key.
const REL_DEDUP_INDEX: TableDefinition<&str, &str> = TableDefinition::new("rel_dedup_index");
/// `entity_id -> newline-separated relationship ids` (both endpoints indexed).
const REL_BY_ENTITY: TableDefinition<&str, &str> = TableDefinition::new("rel_by_entity");

fn entity_key(normalized_name: &str, entity_type: EntityType) -> String {
    format!("{normalized_name}\u{0}{}", entity_type.as_str())
}

fn rel_dedup_key(from: Uuid, to: Uuid, rel_type: &str, active: bool) -> String {
    format!("{from}\u{0}{to}\u{0}{rel_type}\u{0}{active}")
}

fn append_id(existing: Option<&str>, id: Uuid) -> String {
    match existing {
        None | Some("") => id.to_string(),
        Some(list) => format!("{list}\n{id}"),
    }
}

fn split_ids(raw: &str) -> Vec<Uuid> {
    raw.lines()
        .filter(|s| !s.is_empty())
        .filter_map(|s| Uuid::parse_str(s).ok())
        .collect()
}

/// A joined view for [`RelationalStore::get_entity_timeline`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct TimelineEntry {
    pub transition: StateTransition,
    pub meeting_title: String,
    pub meeting_date: chrono::DateTime<Utc>,
}

/// A joined view for [`RelationalStore::get_entity_relationships`], endpoint
/// names resolved so callers don't need a second round-trip (spec §4.2).
#[derive(Debug, Clone, serde::Serialize)]
pub struct RelationshipView {
    pub relationship: EntityRelationship,
    pub from_name: String,
    pub to_name: String,
}

pub struct RelationalStore {
    db: Database,
}

impl RelationalStore {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        {
            let tx = db.begin_write()?;
            tx.open_table(MEETINGS)?;
            tx.open_table(MEMORIES)?;
            tx.open_table(ENTITIES)?;
            tx.open_table(ENTITY_KEY_INDEX)?;
            tx.open_table(ENTITY_LIST_INDEX)?;
            tx.open_table(ENTITY_STATES)?;
            tx.open_table(STATES_BY_ENTITY)?;
            tx.open_table(TRANSITIONS)?;
            tx.open_table(TRANSITIONS_BY_ENTITY)?;
            tx.open_table(RELATIONSHIPS)?;
            tx.open_table(REL_DEDUP_INDEX)?;
            tx.open_table(REL_BY_ENTITY)?;
            tx.commit()?;
        }
        Ok(Self { db })
    }

    // ── Meetings ────────────────────────────────────────────────────────

    pub fn save_meeting(&self, meeting: &Meeting) -> StorageResult<()> {
        let bytes = serde_json::to_vec(meeting)?;
        let tx = self.db.begin_write()?;
        {
            let mut tbl = tx.open_table(MEETINGS)?;
            tbl.insert(meeting.id.to_string().as_str(), bytes.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_meeting(&self, id: Uuid) -> StorageResult<Option<Meeting>> {
        let tx = self.db.begin_read()?;
        let tbl = tx.open_table(MEETINGS)?;
        match tbl.get(id.to_string().as_str())? {
            None => Ok(None),
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
        }
    }

    // ── Memories ────────────────────────────────────────────────────────

    pub fn save_memories(&self, memories: &[Memory]) -> StorageResult<()> {
        let tx = self.db.begin_write()?;
        {
            let mut tbl = tx.open_table(MEMORIES)?;
            for memory in memories {
                let bytes = serde_json::to_vec(memory)?;
                tbl.insert(memory.id.to_string().as_str(), bytes.as_slice())?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_memory(&self, id: Uuid) -> StorageResult<Option<Memory>> {
        let tx = self.db.begin_read()?;
        let tbl = tx.open_table(MEMORIES)?;
        match tbl.get(id.to_string().as_str())? {
            None => Ok(None),
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
        }
    }

    // ── Entities ────────────────────────────────────────────────────────

    /// Upsert by `(normalized_name, type)` (spec §3, §9): existing entities
    /// have their `attributes` merged (new keys win) and `last_updated`
    /// bumped; new entities are inserted as-is. Returns the stored entity
    /// (with its final, possibly-pre-existing id) for each input in order.
    pub fn save_entities(&self, entities: &[Entity]) -> StorageResult<Vec<Entity>> {
        let tx = self.db.begin_write()?;
        let mut results = Vec::with_capacity(entities.len());
        {
            let mut entities_tbl = tx.open_table(ENTITIES)?;
            let mut key_tbl = tx.open_table(ENTITY_KEY_INDEX)?;
            let mut list_tbl = tx.open_table(ENTITY_LIST_INDEX)?;

            for entity in entities {
                let key = entity_key(&entity.normalized_name, entity.entity_type);
                let existing_id = key_tbl.get(key.as_str())?.map(|v| v.value().to_string());

                let stored = match existing_id {
                    Some(id_str) => {
                        let mut current: Entity = entities_tbl
                            .get(id_str.as_str())?
                            .map(|v| serde_json::from_slice::<Entity>(v.value()))
                            .transpose()?
                            .ok_or_else(|| StorageError::NotFound(format!("entity {id_str}")))?;
                        for (k, v) in &entity.attributes {
                            current.attributes.insert(k.clone(), v.clone());
                        }
                        current.last_updated = Utc::now();
                        current
                    }
                    None => {
                        let mut fresh = entity.clone();
                        fresh.last_updated = Utc::now();
                        key_tbl.insert(key.as_str(), fresh.id.to_string().as_str())?;

                        let all_existing = list_tbl.get("all")?.map(|v| v.value().to_string());
                        let all_updated = append_id(all_existing.as_deref(), fresh.id);
                        list_tbl.insert("all", all_updated.as_str())?;

                        let type_slug = fresh.entity_type.as_str();
                        let type_existing = list_tbl.get(type_slug)?.map(|v| v.value().to_string());
                        let type_updated = append_id(type_existing.as_deref(), fresh.id);
                        list_tbl.insert(type_slug, type_updated.as_str())?;

                        fresh
                    }
                };

                let bytes = serde_json::to_vec(&stored)?;
                entities_tbl.insert(stored.id.to_string().as_str(), bytes.as_slice())?;
                results.push(stored);
            }
        }
        tx.commit()?;
        Ok(results)
    }

    pub fn get_entity(&self, id: Uuid) -> StorageResult<Option<Entity>> {
        let tx = self.db.begin_read()?;
        let tbl = tx.open_table(ENTITIES)?;
        match tbl.get(id.to_string().as_str())? {
            None => Ok(None),
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
        }
    }

    pub fn get_entities_batch(&self, ids: &[Uuid]) -> StorageResult<Vec<Entity>> {
        let tx = self.db.begin_read()?;
        let tbl = tx.open_table(ENTITIES)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(v) = tbl.get(id.to_string().as_str())? {
                out.push(serde_json::from_slice(v.value())?);
            }
        }
        Ok(out)
    }

    pub fn get_entity_by_name(&self, name: &str, entity_type: Option<EntityType>) -> StorageResult<Option<Entity>> {
        let normalized = meetgraph_core::normalize_name(name);
        let tx = self.db.begin_read()?;
        let key_tbl = tx.open_table(ENTITY_KEY_INDEX)?;
        let entities_tbl = tx.open_table(ENTITIES)?;

        if let Some(entity_type) = entity_type {
            let key = entity_key(&normalized, entity_type);
            return match key_tbl.get(key.as_str())? {
                None => Ok(None),
                Some(v) => {
                    let id = v.value();
                    match entities_tbl.get(id)? {
                        None => Ok(None),
                        Some(e) => Ok(Some(serde_json::from_slice(e.value())?)),
                    }
                }
            };
        }

        // No type given: scan the closed type set for a match. The set is
        // small and fixed (spec §3), so this stays cheap.
        for candidate in ALL_ENTITY_TYPES {
            let key = entity_key(&normalized, *candidate);
            if let Some(v) = key_tbl.get(key.as_str())? {
                let id = v.value().to_string();
                if let Some(e) = entities_tbl.get(id.as_str())? {
                    return Ok(Some(serde_json::from_slice(e.value())?));
                }
            }
        }
        Ok(None)
    }

    pub fn get_all_entities(
        &self,
        entity_type: Option<EntityType>,
        limit: Option<usize>,
        offset: usize,
    ) -> StorageResult<Vec<Entity>> {
        let tx = self.db.begin_read()?;
        let list_tbl = tx.open_table(ENTITY_LIST_INDEX)?;
        let entities_tbl = tx.open_table(ENTITIES)?;

        let slug = entity_type.map(|t| t.as_str()).unwrap_or("all");
        let ids: Vec<Uuid> = list_tbl
            .get(slug)?
            .map(|v| split_ids(v.value()))
            .unwrap_or_default();

        let mut out = Vec::new();
        for id in ids.into_iter().skip(offset) {
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
            if let Some(v) = entities_tbl.get(id.to_string().as_str())? {
                out.push(serde_json::from_slice(v.value())?);
            }
        }
        Ok(out)
    }

    // ── Entity states & transitions ─────────────────────────────────────

    pub fn save_entity_states(&self, states: &[EntityState]) -> StorageResult<()> {
        let tx = self.db.begin_write()?;
        {
            let mut states_tbl = tx.open_table(ENTITY_STATES)?;
            let mut by_entity_tbl = tx.open_table(STATES_BY_ENTITY)?;
            for state in states {
                let bytes = serde_json::to_vec(state)?;
                states_tbl.insert(state.id.to_string().as_str(), bytes.as_slice())?;

                let entity_key = state.entity_id.to_string();
                let existing = by_entity_tbl.get(entity_key.as_str())?.map(|v| v.value().to_string());
                let updated = append_id(existing.as_deref(), state.id);
                by_entity_tbl.insert(entity_key.as_str(), updated.as_str())?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn save_transitions(&self, transitions: &[StateTransition]) -> StorageResult<()> {
        let tx = self.db.begin_write()?;
        {
            let mut trans_tbl = tx.open_table(TRANSITIONS)?;
            let mut by_entity_tbl = tx.open_table(TRANSITIONS_BY_ENTITY)?;
            for transition in transitions {
                let bytes = serde_json::to_vec(transition)?;
                trans_tbl.insert(transition.id.to_string().as_str(), bytes.as_slice())?;

                let entity_key = transition.entity_id.to_string();
                let existing = by_entity_tbl.get(entity_key.as_str())?.map(|v| v.value().to_string());
                let updated = append_id(existing.as_deref(), transition.id);
                by_entity_tbl.insert(entity_key.as_str(), updated.as_str())?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// The latest [`EntityState`] by timestamp (spec §3: "the 'current'
    /// state is the latest by timestamp"). Deliberately re-sorts by
    /// timestamp rather than trusting insertion order, since retries or
    /// out-of-order batches must not desync P5.
    pub fn get_entity_current_state(&self, entity_id: Uuid) -> StorageResult<Option<EntityState>> {
        let states = self.get_entity_states(entity_id)?;
        Ok(states.into_iter().max_by_key(|s| s.timestamp))
    }

    pub fn get_entity_states(&self, entity_id: Uuid) -> StorageResult<Vec<EntityState>> {
        let tx = self.db.begin_read()?;
        let by_entity_tbl = tx.open_table(STATES_BY_ENTITY)?;
        let states_tbl = tx.open_table(ENTITY_STATES)?;

        let ids: Vec<Uuid> = by_entity_tbl
            .get(entity_id.to_string().as_str())?
            .map(|v| split_ids(v.value()))
            .unwrap_or_default();

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(v) = states_tbl.get(id.to_string().as_str())? {
                out.push(serde_json::from_slice(v.value())?);
            }
        }
        Ok(out)
    }

    /// Joined transition history, newest first, with the originating
    /// meeting's title/date attached (spec §4.2).
    pub fn get_entity_timeline(&self, entity_id: Uuid) -> StorageResult<Vec<TimelineEntry>> {
        let tx = self.db.begin_read()?;
        let by_entity_tbl = tx.open_table(TRANSITIONS_BY_ENTITY)?;
        let trans_tbl = tx.open_table(TRANSITIONS)?;
        let meetings_tbl = tx.open_table(MEETINGS)?;

        let ids: Vec<Uuid> = by_entity_tbl
            .get(entity_id.to_string().as_str())?
            .map(|v| split_ids(v.value()))
            .unwrap_or_default();

        let mut meeting_cache: HashMap<Uuid, (String, chrono::DateTime<Utc>)> = HashMap::new();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(v) = trans_tbl.get(id.to_string().as_str())? else {
                continue;
            };
            let transition: StateTransition = serde_json::from_slice(v.value())?;

            let meeting_info = match meeting_cache.get(&transition.meeting_id) {
                Some(info) => info.clone(),
                None => {
                    let info = match meetings_tbl.get(transition.meeting_id.to_string().as_str())? {
                        Some(m) => {
                            let meeting: Meeting = serde_json::from_slice(m.value())?;
                            (meeting.title, meeting.date)
                        }
                        None => ("unknown meeting".to_string(), transition.timestamp),
                    };
                    meeting_cache.insert(transition.meeting_id, info.clone());
                    info
                }
            };

            out.push(TimelineEntry {
                transition,
                meeting_title: meeting_info.0,
                meeting_date: meeting_info.1,
            });
        }
        out.sort_by(|a, b| b.transition.timestamp.cmp(&a.transition.timestamp));
        Ok(out)
    }

    // ── Relationships ────────────────────────────────────────────────────

    /// Dedup against existing **active** relationships sharing
    /// `(from, to, type)` (spec §4.6 stage 7: global active-scope dedup,
    /// §9 open question resolved in favor of the global reading). Returns
    /// only the relationships actually persisted (fresh ones); duplicates
    /// are silently dropped, matching P6.
    pub fn save_relationships(&self, relationships: &[EntityRelationship]) -> StorageResult<Vec<EntityRelationship>> {
        let tx = self.db.begin_write()?;
        let mut stored = Vec::new();
        {
            let mut rel_tbl = tx.open_table(RELATIONSHIPS)?;
            let mut dedup_tbl = tx.open_table(REL_DEDUP_INDEX)?;
            let mut by_entity_tbl = tx.open_table(REL_BY_ENTITY)?;

            for rel in relationships {
                let dedup_key = rel_dedup_key(rel.from_entity_id, rel.to_entity_id, rel.relationship_type.as_str(), rel.active);
                if rel.active && dedup_tbl.get(dedup_key.as_str())?.is_some() {
                    continue;
                }

                let bytes = serde_json::to_vec(rel)?;
                rel_tbl.insert(rel.id.to_string().as_str(), bytes.as_slice())?;
                if rel.active {
                    dedup_tbl.insert(dedup_key.as_str(), rel.id.to_string().as_str())?;
                }

                for endpoint in [rel.from_entity_id, rel.to_entity_id] {
                    let key = endpoint.to_string();
                    let existing = by_entity_tbl.get(key.as_str())?.map(|v| v.value().to_string());
                    let updated = append_id(existing.as_deref(), rel.id);
                    by_entity_tbl.insert(key.as_str(), updated.as_str())?;
                }

                stored.push(rel.clone());
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    pub fn get_entity_relationships(&self, entity_id: Uuid, active_only: bool) -> StorageResult<Vec<RelationshipView>> {
        let tx = self.db.begin_read()?;
        let by_entity_tbl = tx.open_table(REL_BY_ENTITY)?;
        let rel_tbl = tx.open_table(RELATIONSHIPS)?;
        let entities_tbl = tx.open_table(ENTITIES)?;

        let ids: Vec<Uuid> = by_entity_tbl
            .get(entity_id.to_string().as_str())?
            .map(|v| split_ids(v.value()))
            .unwrap_or_default();

        let mut out = Vec::with_capacity(ids.len());
        let mut name_cache: HashMap<Uuid, String> = HashMap::new();
        for id in ids {
            let Some(v) = rel_tbl.get(id.to_string().as_str())? else {
                continue;
            };
            let relationship: EntityRelationship = serde_json::from_slice(v.value())?;
            if active_only && !relationship.active {
                continue;
            }

            for endpoint in [relationship.from_entity_id, relationship.to_entity_id] {
                if !name_cache.contains_key(&endpoint) {
                    let name = match entities_tbl.get(endpoint.to_string().as_str())? {
                        Some(e) => serde_json::from_slice::<Entity>(e.value())?.name,
                        None => "unknown".to_string(),
                    };
                    name_cache.insert(endpoint, name);
                }
            }

            out.push(RelationshipView {
                from_name: name_cache[&relationship.from_entity_id].clone(),
                to_name: name_cache[&relationship.to_entity_id].clone(),
                relationship,
            });
        }
        Ok(out)
    }

    // ── Analytics (spec §2 supplement, ported from `storage.get_analytics_data`) ──

    /// Entity counts by type, over the full catalog.
    pub fn analytics_entity_counts(&self) -> StorageResult<HashMap<String, usize>> {
        let tx = self.db.begin_read()?;
        let list_tbl = tx.open_table(ENTITY_LIST_INDEX)?;
        let mut out = HashMap::new();
        for entity_type in ALL_ENTITY_TYPES {
            let slug = entity_type.as_str();
            let count = list_tbl.get(slug)?.map(|v| split_ids(v.value()).len()).unwrap_or(0);
            if count > 0 {
                out.insert(slug.to_string(), count);
            }
        }
        Ok(out)
    }

    /// Active relationship counts by type, scanned once over the whole
    /// relationship table (spec §2).
    pub fn analytics_relationship_counts(&self) -> StorageResult<HashMap<String, usize>> {
        let tx = self.db.begin_read()?;
        let rel_tbl = tx.open_table(RELATIONSHIPS)?;
        let mut out = HashMap::new();
        for entry in rel_tbl.iter()? {
            let (_, v) = entry?;
            let relationship: EntityRelationship = serde_json::from_slice(v.value())?;
            if relationship.active {
                *out.entry(relationship.relationship_type.as_str().to_string()).or_insert(0) += 1;
            }
        }
        Ok(out)
    }

    /// Transition counts bucketed by calendar date (`YYYY-MM-DD`), for the
    /// query engine's velocity/trend visualizations (spec §2).
    pub fn analytics_state_changes_by_date(&self) -> StorageResult<HashMap<String, usize>> {
        let tx = self.db.begin_read()?;
        let trans_tbl = tx.open_table(TRANSITIONS)?;
        let mut out = HashMap::new();
        for entry in trans_tbl.iter()? {
            let (_, v) = entry?;
            let transition: StateTransition = serde_json::from_slice(v.value())?;
            let day = transition.timestamp.format("%Y-%m-%d").to_string();
            *out.entry(day).or_insert(0) += 1;
        }
        Ok(out)
    }
}

const ALL_ENTITY_TYPES: &[EntityType] = &[
    EntityType::Person,
    EntityType::Project,
    EntityType::Feature,
    EntityType::Task,
    EntityType::Decision,
    EntityType::Deadline,
    EntityType::Risk,
    EntityType::Goal,
    EntityType::Metric,
    EntityType::Team,
    EntityType::System,
    EntityType::Technology,
];

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_core::RelationshipType;
    use serde_json::Value;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("meetgraph-relational-test-{name}-{}.redb", Uuid::new_v4()))
    }

    #[test]
    fn entity_upsert_merges_attributes() {
        let path = temp_path("upsert");
        let store = RelationalStore::open(&path).unwrap();

        let mut e1 = Entity::new(EntityType::Project, "Project Alpha");
        e1.attributes.insert("status".to_string(), Value::String("planned".to_string()));
        let stored1 = store.save_entities(&[e1.clone()]).unwrap();
        assert_eq!(stored1.len(), 1);

        let mut e2 = Entity::new(EntityType::Project, "project alpha");
        e2.attributes.insert("owner".to_string(), Value::String("Dana".to_string()));
        let stored2 = store.save_entities(&[e2]).unwrap();

        assert_eq!(stored2[0].id, stored1[0].id, "same (normalized_name, type) must upsert, not duplicate");
        assert_eq!(stored2[0].attributes.get("status").unwrap(), "planned");
        assert_eq!(stored2[0].attributes.get("owner").unwrap(), "Dana");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn current_state_is_latest_by_timestamp() {
        let path = temp_path("current-state");
        let store = RelationalStore::open(&path).unwrap();
        let entity = store.save_entities(&[Entity::new(EntityType::Project, "Beta")]).unwrap().remove(0);
        let meeting_id = Uuid::new_v4();

        let older = EntityState {
            id: Uuid::new_v4(),
            entity_id: entity.id,
            state: HashMap::from([("status".to_string(), Value::String("planned".to_string()))]),
            meeting_id,
            timestamp: Utc::now() - chrono::Duration::days(1),
            confidence: 0.9,
        };
        let newer = EntityState {
            id: Uuid::new_v4(),
            entity_id: entity.id,
            state: HashMap::from([("status".to_string(), Value::String("in_progress".to_string()))]),
            meeting_id,
            timestamp: Utc::now(),
            confidence: 0.9,
        };
        // Insert newer first to prove we don't rely on append order.
        store.save_entity_states(&[newer.clone(), older]).unwrap();

        let current = store.get_entity_current_state(entity.id).unwrap().unwrap();
        assert_eq!(current.id, newer.id);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn relationship_dedup_on_second_identical_save() {
        let path = temp_path("rel-dedup");
        let store = RelationalStore::open(&path).unwrap();
        let a = store.save_entities(&[Entity::new(EntityType::Person, "Alice")]).unwrap().remove(0);
        let b = store.save_entities(&[Entity::new(EntityType::Project, "Project Alpha")]).unwrap().remove(0);

        let rel = EntityRelationship {
            id: Uuid::new_v4(),
            from_entity_id: a.id,
            to_entity_id: b.id,
            relationship_type: RelationshipType::Owns,
            attributes: HashMap::new(),
            meeting_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            active: true,
        };
        let first = store.save_relationships(&[rel.clone()]).unwrap();
        assert_eq!(first.len(), 1);

        let mut rel2 = rel.clone();
        rel2.id = Uuid::new_v4();
        let second = store.save_relationships(&[rel2]).unwrap();
        assert_eq!(second.len(), 0, "identical active (from,to,type) must not duplicate");

        let views = store.get_entity_relationships(a.id, true).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].from_name, "Alice");
        assert_eq!(views[0].to_name, "Project Alpha");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn analytics_counts_reflect_saved_data() {
        let path = temp_path("analytics");
        let store = RelationalStore::open(&path).unwrap();
        let a = store.save_entities(&[Entity::new(EntityType::Person, "Alice")]).unwrap().remove(0);
        let b = store.save_entities(&[Entity::new(EntityType::Project, "Project Alpha")]).unwrap().remove(0);

        let rel = EntityRelationship {
            id: Uuid::new_v4(),
            from_entity_id: a.id,
            to_entity_id: b.id,
            relationship_type: RelationshipType::Owns,
            attributes: HashMap::new(),
            meeting_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            active: true,
        };
        store.save_relationships(&[rel]).unwrap();

        let transition = StateTransition {
            id: Uuid::new_v4(),
            entity_id: b.id,
            from_state: None,
            to_state: HashMap::from([("status".to_string(), Value::String("planned".to_string()))]),
            changed_fields: vec!["status".to_string()],
            reason: "Initial state captured".to_string(),
            meeting_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };
        store.save_transitions(&[transition.clone()]).unwrap();

        let entity_counts = store.analytics_entity_counts().unwrap();
        assert_eq!(entity_counts.get("person"), Some(&1));
        assert_eq!(entity_counts.get("project"), Some(&1));

        let rel_counts = store.analytics_relationship_counts().unwrap();
        assert_eq!(rel_counts.get("owns"), Some(&1));

        let day = transition.timestamp.format("%Y-%m-%d").to_string();
        let by_date = store.analytics_state_changes_by_date().unwrap();
        assert_eq!(by_date.get(&day), Some(&1));

        let _ = std::fs::remove_file(&path);
    }
}
