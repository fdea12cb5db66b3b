//! Ingest command for a single event payload.

use std::io::Write;

use anyhow::Result;
use pm_core::{CategorizedEvent, EventStore, Ingestor, Rejection};
use serde_json::Value;

use super::util::write_json;

/// Ingests `raw` and prints either the stored event or the rejection.
///
/// Returns whether the payload was accepted. Storage failures are errors, not
/// rejections.
pub fn run<W: Write, S: EventStore>(
    writer: &mut W,
    ingestor: &Ingestor<S>,
    raw: &str,
) -> Result<bool> {
    match ingest_line(ingestor, raw)? {
        Ok(event) => {
            write_json(writer, &event)?;
            Ok(true)
        }
        Err(rejection) => {
            write_json(writer, &rejection)?;
            Ok(false)
        }
    }
}

/// Parses and ingests one payload, sorting client errors into a [`Rejection`].
pub(crate) fn ingest_line<S: EventStore>(
    ingestor: &Ingestor<S>,
    raw: &str,
) -> Result<Result<CategorizedEvent, Rejection>> {
    let payload: Value = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(e) => {
            return Ok(Err(Rejection {
                error: format!("invalid JSON: {e}"),
                kind: "validation",
                field: None,
                valid_types: None,
            }));
        }
    };
    match ingestor.ingest(&payload) {
        Ok(event) => Ok(Ok(event)),
        Err(err) if err.is_retryable() => {
            Err(anyhow::Error::new(err).context("failed to store event"))
        }
        Err(err) => Ok(Err(err.rejection())),
    }
}
