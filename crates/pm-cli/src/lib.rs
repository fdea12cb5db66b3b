//! PlayMetric CLI library.
//!
//! This crate provides the CLI interface for PlayMetric.

mod cli;
pub mod commands;
mod config;

pub use cli::{ActorsAction, Cli, Commands};
pub use config::Config;
