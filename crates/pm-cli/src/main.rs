use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pm_core::Ingestor;
use pm_db::Database;
use tracing_subscriber::EnvFilter;

use pm_cli::commands::{actors, events, import, ingest, status, summary, types};
use pm_cli::{ActorsAction, Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path, config.busy_timeout())
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config_path = cli.config.as_deref();
    let mut stdout = io::stdout().lock();

    match cli.command {
        Some(Commands::Ingest { payload }) => {
            let (db, _config) = open_database(config_path)?;
            let payload = match payload {
                Some(payload) => payload,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("failed to read payload from stdin")?;
                    buf
                }
            };
            let ingestor = Ingestor::new(db);
            if !ingest::run(&mut stdout, &ingestor, &payload)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Some(Commands::Import { jobs }) => {
            let (db, config) = open_database(config_path)?;
            let ingestor = Ingestor::new(db);
            let jobs = jobs.unwrap_or(config.import_jobs);
            let summary = import::run(io::stdin().lock(), &mut stdout, &ingestor, jobs)?;
            tracing::info!(
                accepted = summary.accepted,
                rejected = summary.rejected,
                "import finished"
            );
        }
        Some(Commands::Actors { action }) => {
            let (db, _config) = open_database(config_path)?;
            match action {
                ActorsAction::List(args) => actors::list(&mut stdout, &db, &args)?,
                ActorsAction::Show { id } => actors::show(&mut stdout, &db, &id)?,
            }
        }
        Some(Commands::Events(args)) => {
            let (db, _config) = open_database(config_path)?;
            events::run(&mut stdout, &db, &args)?;
        }
        Some(Commands::Summary) => {
            let (db, _config) = open_database(config_path)?;
            summary::run(&mut stdout, &db, chrono::Utc::now())?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(config_path)?;
            status::run(&mut stdout, &db, &config.database_path)?;
        }
        Some(Commands::Types) => {
            types::run(&mut stdout)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(ExitCode::SUCCESS)
}
