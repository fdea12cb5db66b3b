//! Event router: classifies a payload by type tag and builds the typed event.
//!
//! Field extraction is a single coercion routine driven by the category's
//! [`FieldSpec`] table; no category has bespoke parsing code.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::event::{CategorizedEvent, ConstructionError, EventBody};
use crate::event_type::EventType;
use crate::params::{GlobalParameters, as_integer, json_kind};
use crate::schema::{self, FieldKind, FieldSpec};
use crate::types::EventId;

/// Wire name of the type tag inside an ingestion payload.
pub const EVENT_TYPE_KEY: &str = "eventType";

/// Classification failures. These are client errors and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("missing eventType")]
    MissingType,

    #[error("unknown event type: {tag}")]
    UnknownType { tag: String },

    #[error("missing field {name}")]
    MissingField { name: &'static str },

    #[error("type mismatch on {name}: expected {expected}, got {found}")]
    TypeMismatch {
        name: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

impl RoutingError {
    /// The offending field name, when one applies.
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingType | Self::UnknownType { .. } => Some(EVENT_TYPE_KEY),
            Self::MissingField { name } | Self::TypeMismatch { name, .. } => Some(*name),
            Self::Construction(ConstructionError::EmptyField { field }) => Some(*field),
            Self::Construction(ConstructionError::CategoryMismatch { .. }) => None,
        }
    }

    /// Every valid tag, reported alongside unknown-type rejections.
    pub fn valid_types(&self) -> Option<Vec<&'static str>> {
        matches!(self, Self::UnknownType { .. }).then(EventType::valid_tags)
    }
}

/// Reads the type tag from a raw payload.
pub fn type_tag(payload: &Map<String, Value>) -> Result<&str, RoutingError> {
    match payload.get(EVENT_TYPE_KEY) {
        None | Some(Value::Null) => Err(RoutingError::MissingType),
        Some(Value::String(tag)) => Ok(tag.as_str()),
        Some(other) => Err(RoutingError::UnknownType {
            tag: other.to_string(),
        }),
    }
}

/// Classifies `tag`, coerces `raw_fields` into the category's typed shape, and
/// constructs the event under a freshly generated ID.
///
/// Pure apart from ID generation: two calls with identical inputs produce
/// events equal in every field but the ID.
pub fn classify_and_build(
    tag: &str,
    global_params: GlobalParameters,
    raw_fields: &Map<String, Value>,
) -> Result<CategorizedEvent, RoutingError> {
    let (event_type, descriptor) =
        schema::resolve(tag).ok_or_else(|| RoutingError::UnknownType {
            tag: tag.to_string(),
        })?;

    let mut fields = Map::new();
    for spec in descriptor.fields {
        match lookup(raw_fields, spec) {
            Some(raw) => {
                fields.insert(spec.name.to_string(), coerce(spec, raw)?);
            }
            None if spec.required => {
                return Err(RoutingError::MissingField { name: spec.name });
            }
            None => {}
        }
    }

    // Coerced values always fit their target types, so a failure here is a
    // table/struct disagreement.
    let body = EventBody::from_fields(descriptor.category, fields).map_err(|e| {
        RoutingError::TypeMismatch {
            name: "payload",
            expected: descriptor.category.as_str(),
            found: e.to_string(),
        }
    })?;

    let event = CategorizedEvent::new(EventId::generate(), event_type, global_params, body)?;
    tracing::debug!(
        event_id = %event.id(),
        %event_type,
        category = %descriptor.category,
        "classified event"
    );
    Ok(event)
}

/// Finds a field by canonical name, then by its aliases in order.
fn lookup<'a>(raw: &'a Map<String, Value>, spec: &FieldSpec) -> Option<&'a Value> {
    std::iter::once(spec.name)
        .chain(spec.aliases.iter().copied())
        .find_map(|name| raw.get(name).filter(|v| !v.is_null()))
}

fn coerce(spec: &FieldSpec, raw: &Value) -> Result<Value, RoutingError> {
    let mismatch = || RoutingError::TypeMismatch {
        name: spec.name,
        expected: spec.kind.name(),
        found: describe(raw),
    };
    let coerced = match spec.kind {
        FieldKind::Str => Some(match raw {
            Value::String(s) => Value::String(s.clone()),
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => Value::String(other.to_string()),
        }),
        FieldKind::Int => as_integer(raw)
            .and_then(|n| i32::try_from(n).ok())
            .map(Value::from),
        FieldKind::Long => as_integer(raw).map(Value::from),
        FieldKind::Double => as_double(raw)
            .and_then(Number::from_f64)
            .map(Value::Number),
        FieldKind::Bool => match raw {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            _ => None,
        },
    };
    coerced.ok_or_else(mismatch)
}

fn as_double(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::String(s) => format!("{s:?}"),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => json_kind(other).to_string(),
    }
}
