//! Typed, immutable categorized events.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event_type::EventType;
use crate::params::GlobalParameters;
use crate::schema::{self, Category};
use crate::types::{ActorId, EventId};

/// A category construction invariant was violated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("event type {event_type} does not belong to the {category} category")]
    CategoryMismatch {
        event_type: EventType,
        category: Category,
    },
}

/// Game session and gameplay fields. Also the home of unclassified tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lives_remaining: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_remaining: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powerups_used: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemies_defeated: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bosses_defeated: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playing_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<String>,
}

/// Level progression fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    /// Never blank; enforced by [`CategorizedEvent::new`].
    pub level_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// Milliseconds spent in the level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars_earned: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perfect_completion: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_reached: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints_used: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skips_used: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_collected: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemies_defeated: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damages_taken: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powerups_used: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<String>,
}

/// In-game economy and purchase fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomyEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_money_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_before: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<String>,
}

/// Mission and quest fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_claimed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<String>,
}

/// Advertisement interaction fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdsEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_placement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<String>,
}

/// UI and tutorial interaction fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiInteractionEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<String>,
}

/// Category-specific payload of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "data", rename_all = "snake_case")]
pub enum EventBody {
    Game(GameEvent),
    Level(LevelEvent),
    Economy(EconomyEvent),
    Mission(MissionEvent),
    Ads(AdsEvent),
    UiInteraction(UiInteractionEvent),
}

impl EventBody {
    pub const fn category(&self) -> Category {
        match self {
            Self::Game(_) => Category::Game,
            Self::Level(_) => Category::Level,
            Self::Economy(_) => Category::Economy,
            Self::Mission(_) => Category::Mission,
            Self::Ads(_) => Category::Ads,
            Self::UiInteraction(_) => Category::UiInteraction,
        }
    }

    /// Deserializes a category body from canonical, already-coerced fields.
    pub fn from_fields(
        category: Category,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        let value = serde_json::Value::Object(fields);
        Ok(match category {
            Category::Game => Self::Game(serde_json::from_value(value)?),
            Category::Level => Self::Level(serde_json::from_value(value)?),
            Category::Economy => Self::Economy(serde_json::from_value(value)?),
            Category::Mission => Self::Mission(serde_json::from_value(value)?),
            Category::Ads => Self::Ads(serde_json::from_value(value)?),
            Category::UiInteraction => Self::UiInteraction(serde_json::from_value(value)?),
        })
    }

    /// The body's canonical field map; the inverse of [`Self::from_fields`].
    pub fn to_fields(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        let value = match self {
            Self::Game(body) => serde_json::to_value(body)?,
            Self::Level(body) => serde_json::to_value(body)?,
            Self::Economy(body) => serde_json::to_value(body)?,
            Self::Mission(body) => serde_json::to_value(body)?,
            Self::Ads(body) => serde_json::to_value(body)?,
            Self::UiInteraction(body) => serde_json::to_value(body)?,
        };
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(serde::ser::Error::custom("event body is not an object")),
        }
    }
}

/// A classified event, immutable once constructed.
///
/// The only way to obtain one is [`CategorizedEvent::new`] (or deserializing,
/// which goes through the same checks), so every value upholds the category
/// invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventDocument", into = "EventDocument")]
pub struct CategorizedEvent {
    id: EventId,
    event_type: EventType,
    global_params: GlobalParameters,
    body: EventBody,
}

impl CategorizedEvent {
    /// Validates and assembles an event.
    pub fn new(
        id: EventId,
        event_type: EventType,
        global_params: GlobalParameters,
        body: EventBody,
    ) -> Result<Self, ConstructionError> {
        let category = body.category();
        if schema::classify(event_type) != category {
            return Err(ConstructionError::CategoryMismatch {
                event_type,
                category,
            });
        }
        if let EventBody::Level(level) = &body {
            if level.level_id.trim().is_empty() {
                return Err(ConstructionError::EmptyField { field: "levelId" });
            }
        }
        Ok(Self {
            id,
            event_type,
            global_params,
            body,
        })
    }

    pub const fn id(&self) -> &EventId {
        &self.id
    }

    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    pub const fn category(&self) -> Category {
        self.body.category()
    }

    pub const fn global_params(&self) -> &GlobalParameters {
        &self.global_params
    }

    pub const fn actor_id(&self) -> &ActorId {
        &self.global_params.actor_id
    }

    pub const fn body(&self) -> &EventBody {
        &self.body
    }
}

/// Serialized shape of a [`CategorizedEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDocument {
    id: EventId,
    event_type: EventType,
    global_params: GlobalParameters,
    #[serde(flatten)]
    body: EventBody,
}

impl TryFrom<EventDocument> for CategorizedEvent {
    type Error = ConstructionError;

    fn try_from(doc: EventDocument) -> Result<Self, Self::Error> {
        Self::new(doc.id, doc.event_type, doc.global_params, doc.body)
    }
}

impl From<CategorizedEvent> for EventDocument {
    fn from(event: CategorizedEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            global_params: event.global_params,
            body: event.body,
        }
    }
}
