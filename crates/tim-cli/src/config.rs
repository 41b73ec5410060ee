//! Configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tim_core::Storage;
use tim_db::{JsonStore, SqliteStore};

/// Which storage backend holds the entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A single JSON document at `data_path`.
    #[default]
    Json,
    /// A SQLite database at `database_path`.
    Sqlite,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: Backend,
    /// Path to the JSON document.
    pub data_path: PathBuf,
    /// Path to the SQLite database.
    pub database_path: PathBuf,
    /// Default window of `tim summary`, in days.
    pub summary_days: u32,
    /// Default width of `tim graph`, in weeks.
    pub graph_weeks: u32,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            backend: Backend::default(),
            data_path: data_dir.join("timetracker.json"),
            database_path: data_dir.join("tim.db"),
            summary_days: 7,
            graph_weeks: 12,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
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

        // TIM_BACKEND, TIM_DATA_PATH, ...
        figment = figment.merge(Env::prefixed("TIM_"));

        figment.extract()
    }

    /// Opens the configured storage backend.
    pub fn open_storage(&self) -> Result<Box<dyn Storage>> {
        match self.backend {
            Backend::Json => Ok(Box::new(JsonStore::new(&self.data_path))),
            Backend::Sqlite => {
                let store = SqliteStore::open(&self.database_path).with_context(|| {
                    format!("failed to open {}", self.database_path.display())
                })?;
                Ok(Box::new(store))
            }
        }
    }
}

/// Returns the platform-specific config directory for tim.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tim"))
}

/// Returns the platform-specific data directory for tim.
///
/// On Linux: `~/.local/share/tim`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tim"))
}
