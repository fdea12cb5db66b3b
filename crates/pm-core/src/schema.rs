//! Category schema registry.
//!
//! Each category is described by data: the type-tag prefixes it claims, the
//! fields it recognizes, their coercion rule, whether they are required, and
//! any wire aliases. Classification and field extraction are driven entirely
//! by these tables.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::event_type::EventType;

/// The closed set of event categories, one store partition each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Game,
    Level,
    Economy,
    Mission,
    Ads,
    UiInteraction,
}

impl Category {
    pub const ALL: [Self; 6] = [
        Self::Game,
        Self::Level,
        Self::Economy,
        Self::Mission,
        Self::Ads,
        Self::UiInteraction,
    ];

    /// Short name used on the command line and in serialized output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Level => "level",
            Self::Economy => "economy",
            Self::Mission => "mission",
            Self::Ads => "ads",
            Self::UiInteraction => "ui_interaction",
        }
    }

    /// Name of the logical collection holding this category's events.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Game => "game_events",
            Self::Level => "level_events",
            Self::Economy => "economy_events",
            Self::Mission => "mission_events",
            Self::Ads => "ads_events",
            Self::UiInteraction => "ui_interaction_events",
        }
    }

    /// The field table for this category.
    pub fn descriptor(self) -> &'static CategoryDescriptor {
        match self {
            Self::Game => &GAME,
            Self::Level => &LEVEL,
            Self::Economy => &ECONOMY,
            Self::Mission => &MISSION,
            Self::Ads => &ADS,
            Self::UiInteraction => &UI_INTERACTION,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized category names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "game" => Ok(Self::Game),
            "level" => Ok(Self::Level),
            "economy" => Ok(Self::Economy),
            "mission" => Ok(Self::Mission),
            "ads" => Ok(Self::Ads),
            "ui_interaction" | "ui" => Ok(Self::UiInteraction),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// How a raw value is coerced into a typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    Long,
    Double,
    Bool,
}

impl FieldKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::Bool => "bool",
        }
    }
}

/// One recognized field of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Canonical wire name.
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Fallback wire names, consulted in order when `name` is absent.
    pub aliases: &'static [&'static str],
}

impl FieldSpec {
    const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            aliases: &[],
        }
    }

    const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            aliases: &[],
        }
    }

    const fn aliased(self, aliases: &'static [&'static str]) -> Self {
        Self { aliases, ..self }
    }
}

/// Schema of a single category.
#[derive(Debug)]
pub struct CategoryDescriptor {
    pub category: Category,
    /// Type-tag prefixes this category claims.
    pub prefixes: &'static [&'static str],
    pub fields: &'static [FieldSpec],
}

impl CategoryDescriptor {
    /// Names of the fields that must be present.
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.required).map(|f| f.name)
    }
}

use FieldKind::{Bool, Double, Int, Long, Str};

const ADDITIONAL_DATA: FieldSpec = FieldSpec::optional("additionalData", Str);

static GAME: CategoryDescriptor = CategoryDescriptor {
    category: Category::Game,
    prefixes: &["SESSION_", "GAME_"],
    fields: &[
        FieldSpec::optional("gameId", Str),
        FieldSpec::optional("score", Long),
        FieldSpec::optional("highScore", Long),
        FieldSpec::optional("livesRemaining", Int),
        FieldSpec::optional("healthRemaining", Int),
        FieldSpec::optional("powerupsUsed", Int),
        FieldSpec::optional("enemiesDefeated", Int),
        FieldSpec::optional("bossesDefeated", Int),
        FieldSpec::optional("playingPattern", Str),
        ADDITIONAL_DATA,
    ],
};

static LEVEL: CategoryDescriptor = CategoryDescriptor {
    category: Category::Level,
    prefixes: &["LEVEL_"],
    fields: &[
        FieldSpec::optional("gameId", Str),
        FieldSpec::required("levelId", Str),
        FieldSpec::optional("levelNumber", Int),
        FieldSpec::optional("difficulty", Str),
        FieldSpec::optional("attemptCount", Int),
        FieldSpec::optional("completed", Bool),
        FieldSpec::optional("levelDuration", Long),
        FieldSpec::optional("score", Long).aliased(&["highScore"]),
        FieldSpec::optional("starsEarned", Int),
        FieldSpec::optional("perfectCompletion", Bool),
        FieldSpec::optional("failReason", Str),
        FieldSpec::optional("checkpointReached", Str),
        FieldSpec::optional("hintsUsed", Int),
        FieldSpec::optional("skipsUsed", Int),
        FieldSpec::optional("itemsCollected", Int),
        FieldSpec::optional("enemiesDefeated", Int),
        FieldSpec::optional("damagesTaken", Int),
        FieldSpec::optional("powerupsUsed", Int),
        ADDITIONAL_DATA,
    ],
};

static ECONOMY: CategoryDescriptor = CategoryDescriptor {
    category: Category::Economy,
    prefixes: &["ECONOMY_"],
    fields: &[
        FieldSpec::optional("transactionId", Str),
        FieldSpec::optional("currencyType", Str),
        FieldSpec::optional("amount", Double),
        FieldSpec::optional("transactionType", Str),
        FieldSpec::optional("realMoneyValue", Double),
        FieldSpec::optional("itemId", Str),
        FieldSpec::optional("itemName", Str),
        FieldSpec::optional("itemCategory", Str),
        FieldSpec::optional("balanceBefore", Double),
        FieldSpec::optional("balanceAfter", Double),
        FieldSpec::optional("source", Str),
        ADDITIONAL_DATA,
    ],
};

static MISSION: CategoryDescriptor = CategoryDescriptor {
    category: Category::Mission,
    prefixes: &["MISSION_"],
    fields: &[
        FieldSpec::optional("missionType", Str),
        FieldSpec::optional("missionId", Str),
        FieldSpec::optional("missionName", Str),
        FieldSpec::optional("completed", Bool),
        FieldSpec::optional("missionDuration", Long),
        FieldSpec::optional("progressPercentage", Int),
        FieldSpec::optional("attemptCount", Int),
        FieldSpec::optional("rewardType", Str),
        FieldSpec::optional("rewardAmount", Double),
        FieldSpec::optional("rewardClaimed", Bool),
        ADDITIONAL_DATA,
    ],
};

static ADS: CategoryDescriptor = CategoryDescriptor {
    category: Category::Ads,
    prefixes: &["AD_"],
    fields: &[
        FieldSpec::optional("adEventType", Str),
        FieldSpec::optional("revenue", Double),
        FieldSpec::optional("adId", Str),
        FieldSpec::optional("adNetwork", Str),
        FieldSpec::optional("adPlacement", Str),
        FieldSpec::optional("adFormat", Str),
        FieldSpec::optional("adDuration", Long),
        FieldSpec::optional("skipped", Bool),
        FieldSpec::optional("clicked", Bool),
        FieldSpec::optional("rewardType", Str),
        FieldSpec::optional("rewardAmount", Double),
        ADDITIONAL_DATA,
    ],
};

static UI_INTERACTION: CategoryDescriptor = CategoryDescriptor {
    category: Category::UiInteraction,
    prefixes: &["UI_", "TUTORIAL_"],
    fields: &[
        FieldSpec::optional("interactionType", Str),
        FieldSpec::optional("screenName", Str),
        FieldSpec::optional("elementId", Str),
        FieldSpec::optional("elementName", Str),
        FieldSpec::optional("elementType", Str),
        FieldSpec::optional("previousScreen", Str),
        FieldSpec::optional("details", Str),
        ADDITIONAL_DATA,
    ],
};

/// Category for known tags that no prefix claims.
pub const FALLBACK_CATEGORY: Category = Category::Game;

/// Prefix dispatch table, most specific (longest) prefix first.
///
/// Ties keep declaration order so the table is deterministic.
static DISPATCH: LazyLock<Vec<(&'static str, Category)>> = LazyLock::new(|| {
    let mut table: Vec<(&'static str, Category)> = Category::ALL
        .into_iter()
        .flat_map(|c| c.descriptor().prefixes.iter().map(move |p| (*p, c)))
        .collect();
    table.sort_by_key(|(prefix, _)| std::cmp::Reverse(prefix.len()));
    table
});

/// Classifies a known tag by prefix, falling back to [`FALLBACK_CATEGORY`].
pub fn classify(event_type: EventType) -> Category {
    let tag = event_type.as_str();
    DISPATCH
        .iter()
        .find(|(prefix, _)| tag.starts_with(prefix))
        .map_or(FALLBACK_CATEGORY, |(_, category)| *category)
}

/// Resolves a raw type tag to its parsed type and category descriptor.
///
/// Returns `None` when the tag is not a member of [`EventType`].
pub fn resolve(tag: &str) -> Option<(EventType, &'static CategoryDescriptor)> {
    let event_type = tag.parse::<EventType>().ok()?;
    Some((event_type, classify(event_type).descriptor()))
}
