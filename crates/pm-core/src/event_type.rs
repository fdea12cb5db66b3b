//! Event type enum as the single source of truth for type-tag strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generates the closed type-tag enumeration with its wire names.
macro_rules! event_types {
    ($($variant:ident => $tag:literal,)+) => {
        /// Canonical event type tags sent by game clients.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventType {
            $($variant,)+
        }

        impl EventType {
            /// Every known type tag, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// The wire name of this tag (e.g. `LEVEL_COMPLETE`).
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $tag,)+
                }
            }
        }

        impl FromStr for EventType {
            type Err = UnknownEventType;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok(Self::$variant),)+
                    _ => Err(UnknownEventType(s.to_string())),
                }
            }
        }
    };
}

event_types! {
    SessionStart => "SESSION_START",
    SessionEnd => "SESSION_END",
    SessionTimeout => "SESSION_TIMEOUT",
    SessionPause => "SESSION_PAUSE",
    SessionResume => "SESSION_RESUME",
    SessionInterrupt => "SESSION_INTERRUPT",

    LevelStart => "LEVEL_START",
    LevelComplete => "LEVEL_COMPLETE",
    LevelFail => "LEVEL_FAIL",
    LevelQuit => "LEVEL_QUIT",
    LevelRestart => "LEVEL_RESTART",
    LevelUnlock => "LEVEL_UNLOCK",
    LevelCheckpoint => "LEVEL_CHECKPOINT",
    LevelSkip => "LEVEL_SKIP",

    GameStart => "GAME_START",
    GameEnd => "GAME_END",
    GameComplete => "GAME_COMPLETE",
    GameBossDefeat => "GAME_BOSS_DEFEAT",
    GameBossFail => "GAME_BOSS_FAIL",
    GameItemCollect => "GAME_ITEM_COLLECT",
    GameItemUse => "GAME_ITEM_USE",
    GameDamageTaken => "GAME_DAMAGE_TAKEN",
    GamePlayerDeath => "GAME_PLAYER_DEATH",
    GamePlayerRespawn => "GAME_PLAYER_RESPAWN",
    GameScoreUpdate => "GAME_SCORE_UPDATE",
    GameHighScore => "GAME_HIGH_SCORE",
    GamePowerupUse => "GAME_POWERUP_USE",
    GamePowerupExpire => "GAME_POWERUP_EXPIRE",

    MissionStart => "MISSION_START",
    MissionComplete => "MISSION_COMPLETE",
    MissionFail => "MISSION_FAIL",
    MissionAbandon => "MISSION_ABANDON",
    MissionRewardClaim => "MISSION_REWARD_CLAIM",

    EconomyTransaction => "ECONOMY_TRANSACTION",
    EconomyCurrencyPurchase => "ECONOMY_CURRENCY_PURCHASE",
    EconomyCurrencySpend => "ECONOMY_CURRENCY_SPEND",
    EconomyCurrencyEarn => "ECONOMY_CURRENCY_EARN",
    EconomyIapPurchase => "ECONOMY_IAP_PURCHASE",
    EconomyIapFail => "ECONOMY_IAP_FAIL",
    EconomyShopView => "ECONOMY_SHOP_VIEW",
    EconomyUpgrade => "ECONOMY_UPGRADE",
    EconomyUnlock => "ECONOMY_UNLOCK",
    EconomyRewardReceived => "ECONOMY_REWARD_RECEIVED",

    SocialInviteSent => "SOCIAL_INVITE_SENT",
    SocialInviteAccepted => "SOCIAL_INVITE_ACCEPTED",
    SocialShare => "SOCIAL_SHARE",
    SocialGuildJoin => "SOCIAL_GUILD_JOIN",
    SocialGuildLeave => "SOCIAL_GUILD_LEAVE",
    SocialChatSend => "SOCIAL_CHAT_SEND",
    SocialMultiplayerJoin => "SOCIAL_MULTIPLAYER_JOIN",
    SocialMultiplayerWin => "SOCIAL_MULTIPLAYER_WIN",
    SocialMultiplayerLose => "SOCIAL_MULTIPLAYER_LOSE",

    AchievementUnlock => "ACHIEVEMENT_UNLOCK",
    AchievementProgress => "ACHIEVEMENT_PROGRESS",
    AchievementLevelUp => "ACHIEVEMENT_LEVEL_UP",
    AchievementCollectionComplete => "ACHIEVEMENT_COLLECTION_COMPLETE",
    AchievementBadgeEarn => "ACHIEVEMENT_BADGE_EARN",

    AdLoaded => "AD_LOADED",
    AdShown => "AD_SHOWN",
    AdCompleted => "AD_COMPLETED",
    AdClosed => "AD_CLOSED",
    AdRevenue => "AD_REVENUE",
    AdLoadFail => "AD_LOAD_FAIL",
    AdClick => "AD_CLICK",
    AdRewardedShown => "AD_REWARDED_SHOWN",
    AdRewardedComplete => "AD_REWARDED_COMPLETE",

    UiInteraction => "UI_INTERACTION",
    UiButtonClick => "UI_BUTTON_CLICK",
    UiMenuOpen => "UI_MENU_OPEN",
    UiMenuClose => "UI_MENU_CLOSE",
    UiSettingsOpen => "UI_SETTINGS_OPEN",
    UiSettingsChange => "UI_SETTINGS_CHANGE",
    UiTutorialView => "UI_TUTORIAL_VIEW",
    UiDialogDismiss => "UI_DIALOG_DISMISS",

    TutorialStart => "TUTORIAL_START",
    TutorialComplete => "TUTORIAL_COMPLETE",
    TutorialSkip => "TUTORIAL_SKIP",
    TutorialStepView => "TUTORIAL_STEP_VIEW",
    TutorialStepComplete => "TUTORIAL_STEP_COMPLETE",

    PerformanceError => "PERFORMANCE_ERROR",
    PerformanceCrash => "PERFORMANCE_CRASH",
    PerformanceLowFps => "PERFORMANCE_LOW_FPS",
    PerformanceHighMemory => "PERFORMANCE_HIGH_MEMORY",
    PerformanceNetworkError => "PERFORMANCE_NETWORK_ERROR",
    PerformanceLoadTime => "PERFORMANCE_LOAD_TIME",

    EngagementLogin => "ENGAGEMENT_LOGIN",
    EngagementLogout => "ENGAGEMENT_LOGOUT",
    EngagementReturn => "ENGAGEMENT_RETURN",
    EngagementDailyBonus => "ENGAGEMENT_DAILY_BONUS",
    EngagementDailyChallenge => "ENGAGEMENT_DAILY_CHALLENGE",
    EngagementScreenView => "ENGAGEMENT_SCREEN_VIEW",

    CustomEvent1 => "CUSTOM_EVENT_1",
    CustomEvent2 => "CUSTOM_EVENT_2",
    CustomEvent3 => "CUSTOM_EVENT_3",
}

impl EventType {
    /// Wire names of every known tag, for rejection messages.
    pub fn valid_tags() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.as_str()).collect()
    }

    /// Whether this tag represents an in-app purchase.
    pub fn is_iap(self) -> bool {
        self.as_str().contains("IAP")
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown type-tag strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        for variant in EventType::ALL {
            let parsed: EventType = variant.as_str().parse().expect("should parse");
            assert_eq!(parsed, *variant, "roundtrip failed for {variant:?}");
        }
    }

    #[test]
    fn tags_are_unique() {
        let mut tags = EventType::valid_tags();
        let total = tags.len();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), total);
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert!("level_complete".parse::<EventType>().is_err());
    }

    #[test]
    fn unknown_type_errors() {
        let err = "LEVEL_TELEPORT".parse::<EventType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown event type: LEVEL_TELEPORT");
    }

    #[test]
    fn iap_detection() {
        assert!(EventType::EconomyIapPurchase.is_iap());
        assert!(EventType::EconomyIapFail.is_iap());
        assert!(!EventType::EconomyCurrencyPurchase.is_iap());
    }

    #[test]
    fn serde_uses_wire_name() {
        let json = serde_json::to_string(&EventType::AdRevenue).unwrap();
        assert_eq!(json, "\"AD_REVENUE\"");
        let parsed: EventType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EventType::AdRevenue);
    }
}
