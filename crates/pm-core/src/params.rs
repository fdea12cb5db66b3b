//! The actor/device/session envelope carried by every event.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{ActorId, DeviceId, Platform, SessionId};

/// Wire name of the envelope object inside an ingestion payload.
pub const GLOBAL_PARAMS_KEY: &str = "globalParams";

/// Envelope validation errors. These are client errors and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent, null, or blank.
    #[error("missing {field}")]
    Missing { field: &'static str },

    /// A field was present but could not be coerced to its declared type.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ValidationError {
    /// The offending field name.
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Missing { field } | Self::Invalid { field, .. } => *field,
        }
    }
}

/// Source of "now" for envelope defaults.
///
/// Injected so extraction can be tested without coupling to the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Common context attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalParameters {
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
    /// When the event occurred. Clients may send these out of order.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Session length so far, in milliseconds.
    #[serde(default)]
    pub session_duration_ms: u64,
}

impl GlobalParameters {
    /// Builds the envelope from the `globalParams` member of a raw payload.
    pub fn from_payload(
        payload: &Map<String, Value>,
        clock: &dyn Clock,
    ) -> Result<Self, ValidationError> {
        match payload.get(GLOBAL_PARAMS_KEY) {
            None | Some(Value::Null) => Err(ValidationError::Missing {
                field: GLOBAL_PARAMS_KEY,
            }),
            Some(Value::Object(map)) => Self::extract(map, clock),
            Some(other) => Err(ValidationError::Invalid {
                field: GLOBAL_PARAMS_KEY,
                reason: format!("expected an object, got {}", json_kind(other)),
            }),
        }
    }

    /// Parses the envelope from a loosely-typed field map, applying defaults.
    ///
    /// A missing timestamp defaults to `clock.now()` and a missing session
    /// duration to zero. `userId` is accepted in place of `actorId`.
    pub fn extract(map: &Map<String, Value>, clock: &dyn Clock) -> Result<Self, ValidationError> {
        let actor_id = match text(map, "actorId")? {
            Some(id) => id,
            None => text(map, "userId")?.ok_or(ValidationError::Missing { field: "actorId" })?,
        };
        let actor_id =
            ActorId::new(actor_id).map_err(|_| ValidationError::Missing { field: "actorId" })?;

        let timestamp = match map.get("timestamp") {
            None | Some(Value::Null) => clock.now(),
            Some(value) => parse_timestamp(value)?,
        };

        let session_duration_ms = match map.get("sessionDuration") {
            None | Some(Value::Null) => 0,
            Some(value) => parse_duration(value)?,
        };

        Ok(Self {
            actor_id,
            device_id: text(map, "deviceId")?.and_then(|id| DeviceId::new(id).ok()),
            device_model: text(map, "deviceModel")?,
            os_version: text(map, "osVersion")?,
            platform: text(map, "platform")?.map(|p| Platform::parse(&p)),
            app_version: text(map, "appVersion")?,
            timestamp,
            session_id: text(map, "sessionId")?.and_then(|id| SessionId::new(id).ok()),
            session_duration_ms,
        })
    }
}

/// Reads a string-valued field, accepting numbers as their decimal text.
fn text(map: &Map<String, Value>, field: &'static str) -> Result<Option<String>, ValidationError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(ValidationError::Invalid {
            field,
            reason: format!("expected a string, got {}", json_kind(other)),
        }),
    }
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, ValidationError> {
    let invalid = |reason: String| ValidationError::Invalid {
        field: "timestamp",
        reason,
    };
    match value {
        Value::String(s) => match DateTime::parse_from_rfc3339(s.trim()) {
            Ok(dt) => Ok(dt.with_timezone(&Utc)),
            Err(e) => s
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .ok_or_else(|| invalid(format!("{s:?} is not RFC 3339: {e}"))),
        },
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| invalid(format!("{n} is not epoch milliseconds"))),
        other => Err(invalid(format!(
            "expected a string or number, got {}",
            json_kind(other)
        ))),
    }
}

fn parse_duration(value: &Value) -> Result<u64, ValidationError> {
    let invalid = |reason: String| ValidationError::Invalid {
        field: "sessionDuration",
        reason,
    };
    if !matches!(value, Value::Number(_) | Value::String(_)) {
        return Err(invalid(format!("expected a number, got {}", json_kind(value))));
    }
    let parsed = as_integer(value);
    let ms = parsed.ok_or_else(|| invalid(format!("{value} is not an integer")))?;
    u64::try_from(ms).map_err(|_| invalid(format!("{ms} is negative")))
}

/// Integers, integral floats, and integer strings.
#[expect(
    clippy::cast_possible_truncation,
    reason = "floats are bounded below 2^53 before the cast"
)]
pub(crate) fn as_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Human-readable JSON type name for error messages.
pub(crate) const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 10, 14, 12, 0, 0).unwrap())
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn extracts_full_envelope() {
        let map = object(json!({
            "actorId": "user_12345",
            "deviceId": "device_abc",
            "deviceModel": "iPhone 14 Pro",
            "osVersion": "iOS 17.1",
            "platform": "iOS",
            "appVersion": "1.0.0",
            "timestamp": "2025-10-14T12:30:00Z",
            "sessionId": "session_xyz",
            "sessionDuration": 1_800_000
        }));
        let params = GlobalParameters::extract(&map, &clock()).unwrap();
        assert_eq!(params.actor_id.as_str(), "user_12345");
        assert_eq!(params.device_id.unwrap().as_str(), "device_abc");
        assert_eq!(params.platform, Some(Platform::Ios));
        assert_eq!(params.session_id.unwrap().as_str(), "session_xyz");
        assert_eq!(params.session_duration_ms, 1_800_000);
        assert_eq!(
            params.timestamp,
            Utc.with_ymd_and_hms(2025, 10, 14, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn applies_defaults() {
        let map = object(json!({"actorId": "u1"}));
        let params = GlobalParameters::extract(&map, &clock()).unwrap();
        assert_eq!(params.timestamp, clock().0);
        assert_eq!(params.session_duration_ms, 0);
        assert!(params.session_id.is_none());
        assert!(params.device_id.is_none());
    }

    #[test]
    fn accepts_user_id_alias() {
        let map = object(json!({"userId": "legacy"}));
        let params = GlobalParameters::extract(&map, &clock()).unwrap();
        assert_eq!(params.actor_id.as_str(), "legacy");
    }

    #[test]
    fn missing_actor_id_fails() {
        let map = object(json!({"sessionId": "s1"}));
        let err = GlobalParameters::extract(&map, &clock()).unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "actorId" });
        assert_eq!(err.to_string(), "missing actorId");
    }

    #[test]
    fn blank_actor_id_fails() {
        let map = object(json!({"actorId": "  "}));
        let err = GlobalParameters::extract(&map, &clock()).unwrap_err();
        assert_eq!(err.field(), "actorId");
    }

    #[test]
    fn coerces_numeric_strings() {
        let map = object(json!({"actorId": 42, "sessionDuration": "1500"}));
        let params = GlobalParameters::extract(&map, &clock()).unwrap();
        assert_eq!(params.actor_id.as_str(), "42");
        assert_eq!(params.session_duration_ms, 1500);
    }

    #[test]
    fn rejects_non_numeric_duration() {
        let map = object(json!({"actorId": "u1", "sessionDuration": "long"}));
        let err = GlobalParameters::extract(&map, &clock()).unwrap_err();
        assert_eq!(err.field(), "sessionDuration");
    }

    #[test]
    fn rejects_negative_duration() {
        let map = object(json!({"actorId": "u1", "sessionDuration": -5}));
        let err = GlobalParameters::extract(&map, &clock()).unwrap_err();
        assert_eq!(err.field(), "sessionDuration");
    }

    #[test]
    fn rejects_bad_timestamp() {
        let map = object(json!({"actorId": "u1", "timestamp": "yesterday"}));
        let err = GlobalParameters::extract(&map, &clock()).unwrap_err();
        assert_eq!(err.field(), "timestamp");
    }

    #[test]
    fn accepts_epoch_millis_timestamp() {
        let map = object(json!({"actorId": "u1", "timestamp": 1_760_443_200_000_i64}));
        let params = GlobalParameters::extract(&map, &clock()).unwrap();
        assert_eq!(params.timestamp, clock().0);
    }

    #[test]
    fn accepts_epoch_millis_timestamp_as_string() {
        let map = object(json!({"actorId": "u1", "timestamp": "1760443200000"}));
        let params = GlobalParameters::extract(&map, &clock()).unwrap();
        assert_eq!(params.timestamp, clock().0);

        let map = object(json!({"actorId": "u1", "timestamp": "yesterday"}));
        let err = GlobalParameters::extract(&map, &clock()).unwrap_err();
        assert_eq!(err.field(), "timestamp");
    }

    #[test]
    fn integral_float_session_duration_is_accepted() {
        let map = object(json!({"actorId": "u1", "sessionDuration": 1500.0}));
        let params = GlobalParameters::extract(&map, &clock()).unwrap();
        assert_eq!(params.session_duration_ms, 1500);

        let map = object(json!({"actorId": "u1", "sessionDuration": 1500.5}));
        assert!(GlobalParameters::extract(&map, &clock()).is_err());
    }

    #[test]
    fn missing_envelope_names_global_params() {
        let payload = object(json!({"eventType": "GAME_START"}));
        let err = GlobalParameters::from_payload(&payload, &clock()).unwrap_err();
        assert_eq!(err.field(), "globalParams");
    }

    #[test]
    fn non_object_envelope_is_invalid() {
        let payload = object(json!({"globalParams": "u1"}));
        let err = GlobalParameters::from_payload(&payload, &clock()).unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "globalParams", .. }));
    }

    #[test]
    fn serde_roundtrip_keeps_envelope() {
        let map = object(json!({"actorId": "u1", "sessionId": "s1", "platform": "Android"}));
        let params = GlobalParameters::extract(&map, &clock()).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let parsed: GlobalParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, params);
    }
}
