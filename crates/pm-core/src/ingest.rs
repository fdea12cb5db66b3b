//! Ingestion façade: the single entry point that touches the store on write.
//!
//! Sequence per payload: extract the envelope, upsert the actor, classify and
//! build the typed event, persist it. A failure after the actor upsert does
//! not roll the upsert back.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::actor::ActorAggregator;
use crate::event::CategorizedEvent;
use crate::params::{Clock, GlobalParameters, SystemClock, ValidationError, json_kind};
use crate::router::{self, RoutingError};
use crate::store::{EventStore, StorageError};

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IngestionError {
    /// Short machine-readable class of the failure.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotAnObject(_) | Self::Validation(_) => "validation",
            Self::Routing(_) => "routing",
            Self::Storage(_) => "storage",
        }
    }

    /// Client errors are never worth retrying; storage errors may be.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation(err) => Some(err.field()),
            Self::Routing(err) => err.field(),
            Self::NotAnObject(_) | Self::Storage(_) => None,
        }
    }

    pub fn rejection(&self) -> Rejection {
        Rejection {
            error: self.to_string(),
            kind: self.kind(),
            field: self.field(),
            valid_types: match self {
                Self::Routing(err) => err.valid_types(),
                _ => None,
            },
        }
    }
}

/// Structured body reported to a client whose payload was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_types: Option<Vec<&'static str>>,
}

/// Thread-safe ingestion over a single store.
///
/// The store sits behind a mutex; the actor upsert and the event write each
/// hold it for one storage call, while classification runs unlocked.
pub struct Ingestor<S> {
    store: Mutex<S>,
    clock: Box<dyn Clock>,
}

impl<S: EventStore> Ingestor<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }

    pub fn with_clock(store: S, clock: impl Clock + 'static) -> Self {
        Self {
            store: Mutex::new(store),
            clock: Box::new(clock),
        }
    }

    /// Ingests one raw payload and returns the persisted event.
    pub fn ingest(&self, payload: &Value) -> Result<CategorizedEvent, IngestionError> {
        let result = self.ingest_inner(payload);
        if let Err(err) = &result {
            tracing::warn!(kind = err.kind(), field = err.field(), "rejected payload: {err}");
        }
        result
    }

    fn ingest_inner(&self, payload: &Value) -> Result<CategorizedEvent, IngestionError> {
        let Value::Object(map) = payload else {
            return Err(IngestionError::NotAnObject(json_kind(payload)));
        };

        let params = GlobalParameters::from_payload(map, self.clock.as_ref())?;
        ActorAggregator::upsert(&mut *self.lock(), &params)?;

        let tag = router::type_tag(map)?;
        let event = router::classify_and_build(tag, params, map)?;

        self.lock().save_event(&event)?;
        tracing::info!(
            id = %event.id(),
            event_type = %event.event_type(),
            category = %event.category(),
            actor_id = %event.actor_id(),
            "stored event"
        );
        Ok(event)
    }

    /// Runs a read-only closure against the store.
    pub fn read<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(&*self.lock())
    }

    pub fn into_store(self) -> S {
        self.store.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        // A panic elsewhere cannot leave a half-applied write: every store
        // mutation is a single call.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rayon::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::event::EventBody;
    use crate::params::FixedClock;
    use crate::schema::Category;
    use crate::store::MemoryStore;
    use crate::types::ActorId;

    fn ingestor() -> Ingestor<MemoryStore> {
        Ingestor::with_clock(
            MemoryStore::new(),
            FixedClock(Utc.with_ymd_and_hms(2025, 10, 14, 12, 0, 0).unwrap()),
        )
    }

    fn u1() -> ActorId {
        ActorId::new("u1").unwrap()
    }

    fn level_complete() -> Value {
        json!({
            "globalParams": {"actorId": "u1", "sessionId": "s1"},
            "eventType": "LEVEL_COMPLETE",
            "levelId": "L1",
            "completed": true,
            "score": 1500
        })
    }

    #[test]
    fn first_event_creates_actor_and_level_event() {
        let ingestor = ingestor();
        let event = ingestor.ingest(&level_complete()).unwrap();

        let EventBody::Level(level) = event.body() else {
            panic!("expected a level event, got {:?}", event.category());
        };
        assert_eq!(level.level_id, "L1");
        assert_eq!(level.completed, Some(true));
        assert_eq!(level.score, Some(1500));

        let actor = ingestor.read(|s| s.find_actor(&u1())).unwrap().unwrap();
        assert_eq!(actor.total_events, 1);
        assert_eq!(actor.total_sessions, 1);
        assert_eq!(actor.first_seen, actor.last_seen);
    }

    #[test]
    fn same_session_counts_event_but_not_session() {
        let ingestor = ingestor();
        ingestor.ingest(&level_complete()).unwrap();
        ingestor
            .ingest(&json!({
                "globalParams": {"actorId": "u1", "sessionId": "s1"},
                "eventType": "LEVEL_START",
                "levelId": "L2"
            }))
            .unwrap();

        let actor = ingestor.read(|s| s.find_actor(&u1())).unwrap().unwrap();
        assert_eq!(actor.total_events, 2);
        assert_eq!(actor.total_sessions, 1);
    }

    #[test]
    fn new_session_counts_exactly_once() {
        let ingestor = ingestor();
        ingestor.ingest(&level_complete()).unwrap();
        let mut next = level_complete();
        next["globalParams"]["sessionId"] = json!("s2");
        ingestor.ingest(&next).unwrap();
        ingestor.ingest(&next).unwrap();

        let actor = ingestor.read(|s| s.find_actor(&u1())).unwrap().unwrap();
        assert_eq!(actor.total_events, 3);
        assert_eq!(actor.total_sessions, 2);
    }

    #[test]
    fn missing_envelope_touches_nothing() {
        let ingestor = ingestor();
        let err = ingestor
            .ingest(&json!({"eventType": "LEVEL_COMPLETE", "levelId": "L1"}))
            .unwrap_err();
        assert!(matches!(err, IngestionError::Validation(_)));
        assert_eq!(err.field(), Some("globalParams"));
        assert!(ingestor.read(|s| s.list_actors()).unwrap().is_empty());
        assert_eq!(ingestor.read(|s| s.count_events(Category::Level)).unwrap(), 0);
    }

    #[test]
    fn missing_level_id_still_updates_actor() {
        let ingestor = ingestor();
        let err = ingestor
            .ingest(&json!({
                "globalParams": {"actorId": "u1", "sessionId": "s1"},
                "eventType": "LEVEL_COMPLETE"
            }))
            .unwrap_err();
        assert!(matches!(err, IngestionError::Routing(_)));
        assert_eq!(err.field(), Some("levelId"));

        let actor = ingestor.read(|s| s.find_actor(&u1())).unwrap().unwrap();
        assert_eq!(actor.total_events, 1);
        assert_eq!(ingestor.read(|s| s.count_events(Category::Level)).unwrap(), 0);
    }

    #[test]
    fn unknown_type_lists_valid_types() {
        let ingestor = ingestor();
        let err = ingestor
            .ingest(&json!({
                "globalParams": {"actorId": "u1"},
                "eventType": "DANCE_PARTY"
            }))
            .unwrap_err();
        let rejection = err.rejection();
        assert_eq!(rejection.kind, "routing");
        assert_eq!(rejection.field, Some("eventType"));
        let valid = rejection.valid_types.unwrap();
        assert!(valid.contains(&"LEVEL_COMPLETE"));
        assert!(valid.contains(&"CUSTOM_EVENT_3"));
        assert!(!err.is_retryable());

        for category in Category::ALL {
            assert_eq!(ingestor.read(|s| s.count_events(category)).unwrap(), 0);
        }
        assert!(ingestor.read(|s| s.find_actor(&u1())).unwrap().is_some());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = ingestor().ingest(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.to_string(), "payload must be a JSON object, got an array");
    }

    #[test]
    fn rejection_serializes_camel_case() {
        let err = ingestor()
            .ingest(&json!({"globalParams": {"sessionId": "s1"}, "eventType": "GAME_START"}))
            .unwrap_err();
        let json = serde_json::to_value(err.rejection()).unwrap();
        assert_eq!(
            json,
            json!({"error": "missing actorId", "kind": "validation", "field": "actorId"})
        );
    }

    #[test]
    fn persisted_event_round_trips_by_id() {
        let ingestor = ingestor();
        let event = ingestor
            .ingest(&json!({
                "globalParams": {"actorId": "u1"},
                "eventType": "ECONOMY_IAP_PURCHASE",
                "realMoneyValue": "4.99",
                "currencyType": "gems",
                "amount": 500
            }))
            .unwrap();
        let stored = ingestor
            .read(|s| s.find_event(Category::Economy, event.id()))
            .unwrap()
            .unwrap();
        assert_eq!(stored, event);
    }

    #[test]
    fn concurrent_ingestion_loses_no_updates() {
        let ingestor = ingestor();
        (0..200).into_par_iter().for_each(|i| {
            let payload = json!({
                "globalParams": {"actorId": "u1", "sessionId": format!("s{}", i % 4)},
                "eventType": "GAME_SCORE_UPDATE",
                "score": i
            });
            ingestor.ingest(&payload).unwrap();
        });

        let actor = ingestor.read(|s| s.find_actor(&u1())).unwrap().unwrap();
        assert_eq!(actor.total_events, 200);
        assert_eq!(ingestor.read(|s| s.count_events(Category::Game)).unwrap(), 200);
        assert!(actor.total_sessions >= 4);
    }
}
