//! Actor listing and lookup.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use pm_core::query::{self, ActorFilter};
use pm_core::{ActorId, EventStore, Platform};

use super::util::{parse_instant, write_json};

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only actors last seen on this platform (ios, android, windows, web, ...).
    #[arg(long)]
    pub platform: Option<String>,

    /// Only actors on this app version.
    #[arg(long)]
    pub app_version: Option<String>,

    /// Only actors seen after this instant (RFC 3339 or YYYY-MM-DD).
    #[arg(long, value_parser = parse_instant)]
    pub active_since: Option<DateTime<Utc>>,

    /// Only actors first seen after this instant (RFC 3339 or YYYY-MM-DD).
    #[arg(long, value_parser = parse_instant)]
    pub new_since: Option<DateTime<Utc>>,
}

impl ListArgs {
    fn filter(&self) -> ActorFilter {
        ActorFilter {
            platform: self.platform.as_deref().map(Platform::parse),
            app_version: self.app_version.clone(),
            active_since: self.active_since,
            new_since: self.new_since,
        }
    }
}

pub fn list<W: Write, S: EventStore + ?Sized>(
    writer: &mut W,
    store: &S,
    args: &ListArgs,
) -> Result<()> {
    let actors = query::actors(store, &args.filter()).context("failed to list actors")?;
    write_json(writer, &actors)
}

/// Prints one actor record, or `null` when the id is unknown.
pub fn show<W: Write, S: EventStore + ?Sized>(writer: &mut W, store: &S, id: &str) -> Result<()> {
    let actor_id = ActorId::new(id).context("invalid actor id")?;
    let actor = query::actor(store, &actor_id).context("failed to look up actor")?;
    write_json(writer, &actor)
}
