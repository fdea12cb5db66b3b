//! Core domain logic for PlayMetric telemetry ingestion.
//!
//! This crate contains:
//! - Envelope extraction: the actor/device/session parameters on every event
//! - Classification: type tags, the category schema registry, and the router
//!   that coerces raw fields into typed events
//! - Actor aggregation: per-actor activity records and session counting
//! - Ingestion: the façade that ties the above to a storage collaborator
//! - Queries: read-only lookups and the analytics summary

mod actor;
pub mod event;
pub mod event_type;
mod ingest;
pub mod params;
pub mod query;
pub mod router;
pub mod schema;
pub mod store;
mod types;

pub use actor::{ActorAggregator, ActorRecord, ActorTransition};
pub use event::{CategorizedEvent, ConstructionError, EventBody};
pub use event_type::{EventType, UnknownEventType};
pub use ingest::{IngestionError, Ingestor, Rejection};
pub use params::{Clock, FixedClock, GlobalParameters, SystemClock, ValidationError};
pub use router::RoutingError;
pub use schema::{Category, UnknownCategory};
pub use store::{EventStore, MemoryStore, StorageError};
pub use types::{ActorId, DeviceId, EmptyIdError, EventId, Platform, SessionId};
