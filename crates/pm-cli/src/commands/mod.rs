//! CLI subcommand implementations.

pub mod actors;
pub mod events;
pub mod import;
pub mod ingest;
pub mod status;
pub mod summary;
pub mod types;
mod util;
