//! The storage collaborator.
//!
//! One logical collection per [`Category`] plus one for [`ActorRecord`]s. The
//! actor collection is updated through a single atomic primitive so the
//! aggregator never does a separate read and write.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::actor::ActorRecord;
use crate::event::CategorizedEvent;
use crate::schema::Category;
use crate::types::{ActorId, EventId};

/// Failures of the storage collaborator. Transient; callers may retry.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store did not answer within its timeout (e.g. a locked database).
    #[error("storage timed out: {0}")]
    Timeout(String),

    /// A stored document could not be decoded.
    #[error("corrupt document {id} in {collection}: {reason}")]
    Corrupt {
        collection: &'static str,
        id: String,
        reason: String,
    },

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Keyed document store for actors and categorized events.
///
/// Writes take `&mut self`; callers sharing a store across threads wrap it in
/// a lock (see [`crate::Ingestor`]).
pub trait EventStore {
    /// Atomically reads the record for `actor_id`, passes it to `update`, and
    /// persists the returned record. No other write to the same actor may
    /// interleave between the read and the write.
    fn update_actor(
        &mut self,
        actor_id: &ActorId,
        update: &mut dyn FnMut(Option<ActorRecord>) -> ActorRecord,
    ) -> Result<ActorRecord, StorageError>;

    fn find_actor(&self, actor_id: &ActorId) -> Result<Option<ActorRecord>, StorageError>;

    /// Every actor, ordered by actor id.
    fn list_actors(&self) -> Result<Vec<ActorRecord>, StorageError>;

    /// Persists a write-once event into its category's collection.
    fn save_event(&mut self, event: &CategorizedEvent) -> Result<(), StorageError>;

    fn find_event(
        &self,
        category: Category,
        id: &EventId,
    ) -> Result<Option<CategorizedEvent>, StorageError>;

    /// Every event in a category, in insertion order.
    fn list_events(&self, category: Category) -> Result<Vec<CategorizedEvent>, StorageError>;

    fn list_events_for_actor(
        &self,
        category: Category,
        actor_id: &ActorId,
    ) -> Result<Vec<CategorizedEvent>, StorageError> {
        let mut events = self.list_events(category)?;
        events.retain(|e| e.actor_id() == actor_id);
        Ok(events)
    }

    fn count_events(&self, category: Category) -> Result<u64, StorageError> {
        Ok(self.list_events(category)?.len() as u64)
    }
}

/// Process-local store, used in tests and for dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    actors: BTreeMap<ActorId, ActorRecord>,
    events: HashMap<Category, Vec<CategorizedEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryStore {
    fn update_actor(
        &mut self,
        actor_id: &ActorId,
        update: &mut dyn FnMut(Option<ActorRecord>) -> ActorRecord,
    ) -> Result<ActorRecord, StorageError> {
        let record = update(self.actors.remove(actor_id));
        self.actors.insert(actor_id.clone(), record.clone());
        Ok(record)
    }

    fn find_actor(&self, actor_id: &ActorId) -> Result<Option<ActorRecord>, StorageError> {
        Ok(self.actors.get(actor_id).cloned())
    }

    fn list_actors(&self) -> Result<Vec<ActorRecord>, StorageError> {
        Ok(self.actors.values().cloned().collect())
    }

    fn save_event(&mut self, event: &CategorizedEvent) -> Result<(), StorageError> {
        self.events
            .entry(event.category())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    fn find_event(
        &self,
        category: Category,
        id: &EventId,
    ) -> Result<Option<CategorizedEvent>, StorageError> {
        Ok(self
            .events
            .get(&category)
            .and_then(|events| events.iter().find(|e| e.id() == id))
            .cloned())
    }

    fn list_events(&self, category: Category) -> Result<Vec<CategorizedEvent>, StorageError> {
        Ok(self.events.get(&category).cloned().unwrap_or_default())
    }

    fn count_events(&self, category: Category) -> Result<u64, StorageError> {
        Ok(self.events.get(&category).map_or(0, Vec::len) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::{Map, json};

    use super::*;
    use crate::params::GlobalParameters;
    use crate::router::classify_and_build;

    fn params(actor: &str) -> GlobalParameters {
        GlobalParameters {
            actor_id: ActorId::new(actor).unwrap(),
            device_id: None,
            device_model: None,
            os_version: None,
            platform: None,
            app_version: None,
            timestamp: Utc.with_ymd_and_hms(2025, 10, 14, 12, 0, 0).unwrap(),
            session_id: None,
            session_duration_ms: 0,
        }
    }

    fn fields(value: serde_json::Value) -> Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn events_are_partitioned_by_category() {
        let mut store = MemoryStore::new();
        let game = classify_and_build("GAME_START", params("u1"), &Map::new()).unwrap();
        let level = classify_and_build(
            "LEVEL_COMPLETE",
            params("u1"),
            &fields(json!({"levelId": "1-1"})),
        )
        .unwrap();
        store.save_event(&game).unwrap();
        store.save_event(&level).unwrap();

        assert_eq!(store.count_events(Category::Game).unwrap(), 1);
        assert_eq!(store.count_events(Category::Level).unwrap(), 1);
        assert_eq!(store.count_events(Category::Ads).unwrap(), 0);
        assert!(store.find_event(Category::Game, level.id()).unwrap().is_none());
        assert_eq!(
            store.find_event(Category::Level, level.id()).unwrap(),
            Some(level)
        );
    }

    #[test]
    fn filters_events_by_actor() {
        let mut store = MemoryStore::new();
        for actor in ["u1", "u2", "u1"] {
            let event = classify_and_build("SESSION_START", params(actor), &Map::new()).unwrap();
            store.save_event(&event).unwrap();
        }
        let u1 = ActorId::new("u1").unwrap();
        let events = store.list_events_for_actor(Category::Game, &u1).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.actor_id() == &u1));
    }

    #[test]
    fn missing_actor_is_none() {
        let store = MemoryStore::new();
        let id = ActorId::new("ghost").unwrap();
        assert!(store.find_actor(&id).unwrap().is_none());
        assert!(store.list_actors().unwrap().is_empty());
    }
}
