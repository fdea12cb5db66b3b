//! Event listing.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use pm_core::query;
use pm_core::{ActorId, Category, EventId, EventStore};

use super::util::write_json;

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Only this category (game, level, economy, mission, ads, ui_interaction).
    #[arg(long)]
    pub category: Option<Category>,

    /// Only events from this actor.
    #[arg(long)]
    pub actor: Option<String>,

    /// Look up a single event by id. Requires --category.
    #[arg(long, requires = "category", conflicts_with_all = ["actor", "level", "game"])]
    pub id: Option<String>,

    /// Level events for this level id.
    #[arg(long, conflicts_with_all = ["category", "game"])]
    pub level: Option<String>,

    /// Level events for this game id.
    #[arg(long, conflicts_with_all = ["category", "level"])]
    pub game: Option<String>,
}

/// Prints the selected events.
///
/// With no selector, every event is printed grouped by category.
pub fn run<W: Write, S: EventStore + ?Sized>(
    writer: &mut W,
    store: &S,
    args: &EventsArgs,
) -> Result<()> {
    let actor = args
        .actor
        .as_deref()
        .map(ActorId::new)
        .transpose()
        .context("invalid actor id")?;
    let keep_actor = |events: Vec<pm_core::CategorizedEvent>| match &actor {
        Some(actor) => events.into_iter().filter(|e| e.actor_id() == actor).collect(),
        None => events,
    };

    if let (Some(id), Some(category)) = (&args.id, args.category) {
        let id = EventId::new(id.as_str()).context("invalid event id")?;
        let event = query::event(store, category, &id).context("failed to look up event")?;
        return write_json(writer, &event);
    }
    if let Some(level_id) = &args.level {
        let events = query::level_events(store, level_id).context("failed to list events")?;
        return write_json(writer, &keep_actor(events));
    }
    if let Some(game_id) = &args.game {
        let events =
            query::level_events_for_game(store, game_id).context("failed to list events")?;
        return write_json(writer, &keep_actor(events));
    }
    if let Some(category) = args.category {
        let events =
            query::events(store, category, actor.as_ref()).context("failed to list events")?;
        return write_json(writer, &events);
    }

    let grouped = query::grouped_events(store, actor.as_ref()).context("failed to list events")?;
    write_json(writer, &grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pm_core::{Ingestor, MemoryStore};
    use serde_json::{Value, json};

    fn store() -> MemoryStore {
        let ingestor = Ingestor::new(MemoryStore::new());
        for payload in [
            json!({"globalParams": {"actorId": "a"}, "eventType": "LEVEL_START", "levelId": "1", "gameId": "g1"}),
            json!({"globalParams": {"actorId": "b"}, "eventType": "LEVEL_FAIL", "levelId": "1", "gameId": "g2"}),
            json!({"globalParams": {"actorId": "a"}, "eventType": "UI_BUTTON_CLICK", "elementId": "play"}),
        ] {
            ingestor.ingest(&payload).unwrap();
        }
        ingestor.into_store()
    }

    fn args() -> EventsArgs {
        EventsArgs {
            category: None,
            actor: None,
            id: None,
            level: None,
            game: None,
        }
    }

    fn printed(store: &MemoryStore, args: &EventsArgs) -> Value {
        let mut output = Vec::new();
        run(&mut output, store, args).unwrap();
        serde_json::from_slice(&output).unwrap()
    }

    #[test]
    fn groups_everything_by_default() {
        let out = printed(&store(), &args());
        assert_eq!(out["total"], 3);
        assert_eq!(out["categories"]["level"].as_array().unwrap().len(), 2);
        assert_eq!(out["categories"]["ui_interaction"].as_array().unwrap().len(), 1);
        assert_eq!(out["categories"]["ads"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn filters_by_category_and_actor() {
        let out = printed(
            &store(),
            &EventsArgs {
                category: Some(Category::Level),
                actor: Some("b".into()),
                ..args()
            },
        );
        let events = out.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["eventType"], "LEVEL_FAIL");
    }

    #[test]
    fn filters_level_events_by_level_and_game() {
        let store = store();
        let by_level = printed(
            &store,
            &EventsArgs {
                level: Some("1".into()),
                ..args()
            },
        );
        assert_eq!(by_level.as_array().unwrap().len(), 2);

        let by_game = printed(
            &store,
            &EventsArgs {
                game: Some("g2".into()),
                ..args()
            },
        );
        assert_eq!(by_game.as_array().unwrap().len(), 1);
        assert_eq!(by_game[0]["globalParams"]["actorId"], "b");
    }

    #[test]
    fn looks_up_single_event() {
        let store = store();
        let ui = store.list_events(Category::UiInteraction).unwrap();
        let out = printed(
            &store,
            &EventsArgs {
                category: Some(Category::UiInteraction),
                id: Some(ui[0].id().to_string()),
                ..args()
            },
        );
        assert_eq!(out["data"]["elementId"], "play");

        let missing = printed(
            &store,
            &EventsArgs {
                category: Some(Category::Game),
                id: Some(ui[0].id().to_string()),
                ..args()
            },
        );
        assert!(missing.is_null());
    }
}
