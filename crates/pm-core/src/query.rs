//! Read-only queries over a store, for reporting and dashboards.
//!
//! A missing actor or event is `Ok(None)`, never an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::actor::ActorRecord;
use crate::event::{CategorizedEvent, EventBody};
use crate::schema::Category;
use crate::store::{EventStore, StorageError};
use crate::types::{ActorId, EventId, Platform};

pub fn actor<S: EventStore + ?Sized>(
    store: &S,
    actor_id: &ActorId,
) -> Result<Option<ActorRecord>, StorageError> {
    store.find_actor(actor_id)
}

pub fn actor_exists<S: EventStore + ?Sized>(
    store: &S,
    actor_id: &ActorId,
) -> Result<bool, StorageError> {
    Ok(store.find_actor(actor_id)?.is_some())
}

pub fn actor_count<S: EventStore + ?Sized>(store: &S) -> Result<u64, StorageError> {
    Ok(store.list_actors()?.len() as u64)
}

/// Conjunctive actor filter. An empty filter matches every actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorFilter {
    pub platform: Option<Platform>,
    pub app_version: Option<String>,
    /// Last seen strictly after this instant.
    pub active_since: Option<DateTime<Utc>>,
    /// First seen strictly after this instant.
    pub new_since: Option<DateTime<Utc>>,
}

impl ActorFilter {
    pub fn matches(&self, actor: &ActorRecord) -> bool {
        self.platform
            .as_ref()
            .is_none_or(|p| actor.platform.as_ref() == Some(p))
            && self
                .app_version
                .as_ref()
                .is_none_or(|v| actor.app_version.as_ref() == Some(v))
            && self.active_since.is_none_or(|t| actor.last_seen > t)
            && self.new_since.is_none_or(|t| actor.first_seen > t)
    }
}

pub fn actors<S: EventStore + ?Sized>(
    store: &S,
    filter: &ActorFilter,
) -> Result<Vec<ActorRecord>, StorageError> {
    let mut actors = store.list_actors()?;
    actors.retain(|a| filter.matches(a));
    Ok(actors)
}

pub fn event<S: EventStore + ?Sized>(
    store: &S,
    category: Category,
    id: &EventId,
) -> Result<Option<CategorizedEvent>, StorageError> {
    store.find_event(category, id)
}

pub fn events<S: EventStore + ?Sized>(
    store: &S,
    category: Category,
    actor_id: Option<&ActorId>,
) -> Result<Vec<CategorizedEvent>, StorageError> {
    match actor_id {
        Some(actor_id) => store.list_events_for_actor(category, actor_id),
        None => store.list_events(category),
    }
}

/// Events bucketed by category. Every category is present, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedEvents {
    pub total: u64,
    pub categories: BTreeMap<Category, Vec<CategorizedEvent>>,
}

/// Every event, or every event of one actor, grouped by category.
pub fn grouped_events<S: EventStore + ?Sized>(
    store: &S,
    actor_id: Option<&ActorId>,
) -> Result<GroupedEvents, StorageError> {
    let mut categories = BTreeMap::new();
    let mut total = 0;
    for category in Category::ALL {
        let found = events(store, category, actor_id)?;
        total += found.len() as u64;
        categories.insert(category, found);
    }
    Ok(GroupedEvents { total, categories })
}

/// Level events whose `levelId` equals `level_id`.
pub fn level_events<S: EventStore + ?Sized>(
    store: &S,
    level_id: &str,
) -> Result<Vec<CategorizedEvent>, StorageError> {
    level_events_where(store, |level| level.level_id == level_id)
}

/// Level events whose `gameId` equals `game_id`.
pub fn level_events_for_game<S: EventStore + ?Sized>(
    store: &S,
    game_id: &str,
) -> Result<Vec<CategorizedEvent>, StorageError> {
    level_events_where(store, |level| level.game_id.as_deref() == Some(game_id))
}

fn level_events_where<S: EventStore + ?Sized>(
    store: &S,
    keep: impl Fn(&crate::event::LevelEvent) -> bool,
) -> Result<Vec<CategorizedEvent>, StorageError> {
    let mut events = store.list_events(Category::Level)?;
    events.retain(|e| matches!(e.body(), EventBody::Level(level) if keep(level)));
    Ok(events)
}

/// Headline numbers for a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_actors: u64,
    pub active_actors_24h: u64,
    pub active_actors_7d: u64,
    pub events_per_category: BTreeMap<Category, u64>,
    pub total_events: u64,
    pub ad_revenue: f64,
    pub iap_revenue: f64,
    pub total_revenue: f64,
}

/// Computes the summary relative to `now`.
///
/// Ad revenue sums Ads `revenue`. IAP revenue sums Economy `realMoneyValue`
/// over IAP type tags only.
pub fn summary<S: EventStore + ?Sized>(
    store: &S,
    now: DateTime<Utc>,
) -> Result<AnalyticsSummary, StorageError> {
    let actors = store.list_actors()?;
    let active_since = |window: Duration| {
        let cutoff = now - window;
        actors.iter().filter(|a| a.last_seen > cutoff).count() as u64
    };

    let mut events_per_category = BTreeMap::new();
    for category in Category::ALL {
        events_per_category.insert(category, store.count_events(category)?);
    }

    let ad_revenue: f64 = store
        .list_events(Category::Ads)?
        .iter()
        .filter_map(|e| match e.body() {
            EventBody::Ads(ads) => ads.revenue,
            _ => None,
        })
        .sum();
    let iap_revenue: f64 = store
        .list_events(Category::Economy)?
        .iter()
        .filter(|e| e.event_type().is_iap())
        .filter_map(|e| match e.body() {
            EventBody::Economy(economy) => economy.real_money_value,
            _ => None,
        })
        .sum();

    Ok(AnalyticsSummary {
        total_actors: actors.len() as u64,
        active_actors_24h: active_since(Duration::hours(24)),
        active_actors_7d: active_since(Duration::days(7)),
        total_events: events_per_category.values().sum(),
        events_per_category,
        ad_revenue,
        iap_revenue,
        total_revenue: ad_revenue + iap_revenue,
    })
}
