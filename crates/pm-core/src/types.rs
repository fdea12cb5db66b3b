//! Core identifier types with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An identifier was rejected at construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field} cannot be empty")]
pub struct EmptyIdError {
    pub field: &'static str,
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            ///
            /// Whitespace-only values are rejected along with empty ones.
            pub fn new(id: impl Into<String>) -> Result<Self, EmptyIdError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(EmptyIdError { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = EmptyIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// The player identity events are attributed to.
    ///
    /// Stable across sessions and devices.
    ActorId, "actorId"
);

define_string_id!(
    /// A generated identifier for a persisted event.
    EventId, "event ID"
);

define_string_id!(
    /// A client-declared play session identifier.
    SessionId, "sessionId"
);

define_string_id!(
    /// A client device identifier.
    DeviceId, "deviceId"
);

impl EventId {
    /// Generates a fresh random event ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Client platform.
///
/// Unrecognized platform names are preserved verbatim in [`Platform::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    Ios,
    Android,
    Windows,
    Web,
    Other(String),
}

impl Platform {
    /// Parses a platform name, case-insensitively.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ios" => Self::Ios,
            "android" => Self::Android,
            "windows" => Self::Windows,
            "web" | "webgl" => Self::Web,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Canonical string form used for storage and filtering.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ios => "iOS",
            Self::Android => "Android",
            Self::Windows => "Windows",
            Self::Web => "Web",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Platform {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
