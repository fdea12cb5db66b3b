//! Per-actor aggregate state and the upsert state machine.
//!
//! Every ingested event passes through [`ActorAggregator::upsert`] before it is
//! classified. The aggregate is updated through two named transitions:
//!
//! - [`ActorTransition::NewActor`]: the actor id was never seen. A record is
//!   created with first-seen = last-seen = event time, and the event is
//!   counted (one event, and one session when a session id is present).
//! - [`ActorTransition::ExistingActor`]: last-seen is overwritten with the
//!   event time (last write wins, no clamping), the event count goes up by
//!   one, device and app-version fields are replaced when they differ, and
//!   the session count goes up by one only when the session id differs from
//!   the stored current session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::params::GlobalParameters;
use crate::store::{EventStore, StorageError};
use crate::types::{ActorId, DeviceId, Platform, SessionId};

/// Aggregate activity record for one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRecord {
    pub actor_id: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Set at creation, never changed afterwards.
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub total_events: u64,
    pub total_sessions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session_id: Option<SessionId>,
}

/// Which transition an upsert took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorTransition {
    NewActor,
    ExistingActor { session_changed: bool },
}

impl ActorRecord {
    /// A freshly created record, before the creating event is counted.
    fn created(params: &GlobalParameters) -> Self {
        Self {
            actor_id: params.actor_id.clone(),
            device_id: params.device_id.clone(),
            device_model: params.device_model.clone(),
            os_version: params.os_version.clone(),
            platform: params.platform.clone(),
            app_version: params.app_version.clone(),
            first_seen: params.timestamp,
            last_seen: params.timestamp,
            total_events: 0,
            total_sessions: 0,
            current_session_id: params.session_id.clone(),
        }
    }

    /// Applies one event to `existing`, returning the new record and the
    /// transition taken.
    ///
    /// Pure: callers are responsible for persisting the result.
    pub fn observe(existing: Option<Self>, params: &GlobalParameters) -> (Self, ActorTransition) {
        match existing {
            None => {
                let mut record = Self::created(params);
                record.total_events = 1;
                if record.current_session_id.is_some() {
                    record.total_sessions = 1;
                }
                (record, ActorTransition::NewActor)
            }
            Some(mut record) => {
                let session_changed = record.apply(params);
                (record, ActorTransition::ExistingActor { session_changed })
            }
        }
    }

    /// The existing-actor transition. Returns whether a new session began.
    fn apply(&mut self, params: &GlobalParameters) -> bool {
        self.last_seen = params.timestamp;
        self.total_events += 1;

        if let Some(device_id) = &params.device_id {
            if self.device_id.as_ref() != Some(device_id) {
                self.device_id = Some(device_id.clone());
                self.device_model.clone_from(&params.device_model);
                self.os_version.clone_from(&params.os_version);
                self.platform.clone_from(&params.platform);
            }
        }

        if let Some(app_version) = &params.app_version {
            if self.app_version.as_ref() != Some(app_version) {
                self.app_version = Some(app_version.clone());
            }
        }

        match &params.session_id {
            Some(session_id) if self.current_session_id.as_ref() != Some(session_id) => {
                self.current_session_id = Some(session_id.clone());
                self.total_sessions += 1;
                true
            }
            _ => false,
        }
    }
}

/// Maintains [`ActorRecord`]s in a store.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActorAggregator;

impl ActorAggregator {
    /// Creates or updates the record for `params.actor_id`.
    ///
    /// The read-modify-write runs inside the store's atomic
    /// [`EventStore::update_actor`] primitive, so concurrent upserts for the
    /// same actor never lose increments.
    pub fn upsert<S: EventStore + ?Sized>(
        store: &mut S,
        params: &GlobalParameters,
    ) -> Result<(ActorRecord, ActorTransition), StorageError> {
        let mut transition = ActorTransition::NewActor;
        let record = store.update_actor(&params.actor_id, &mut |existing| {
            let (record, taken) = ActorRecord::observe(existing, params);
            transition = taken;
            record
        })?;

        match transition {
            ActorTransition::NewActor => tracing::info!(
                actor_id = %record.actor_id,
                device_id = ?record.device_id.as_ref().map(DeviceId::as_str),
                platform = ?record.platform.as_ref().map(Platform::as_str),
                "created actor"
            ),
            ActorTransition::ExistingActor { session_changed } => tracing::debug!(
                actor_id = %record.actor_id,
                total_events = record.total_events,
                total_sessions = record.total_sessions,
                session_changed,
                "updated actor"
            ),
        }
        Ok((record, transition))
    }
}
