//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// How long a write waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Worker threads for `pm import`.
    pub import_jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("playmetric.db"),
            busy_timeout_ms: 5000,
            import_jobs: 4,
        }
    }
}

impl Config {
    /// Loads configuration from the default locations, then `config_path`,
    /// then `PM_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // PM_DATABASE_PATH, PM_BUSY_TIMEOUT_MS, PM_IMPORT_JOBS
        figment = figment.merge(Env::prefixed("PM_"));

        figment.extract()
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Returns the platform-specific config directory for playmetric.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("playmetric"))
}

/// Returns the platform-specific data directory for playmetric.
///
/// On Linux: `~/.local/share/playmetric`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("playmetric"))
}
