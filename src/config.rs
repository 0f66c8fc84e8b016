//! Configuration management for CourseHarvest.
//!
//! Settings come from a TOML config file merged with environment and CLI
//! overrides. Precedence for the data directory: `--target` flag, then
//! `COURSEHARVEST_DATA_DIR`, then the config file, then the platform data
//! directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "courseharvest.db";

/// Default user agent for the built-in HTTP scrapers.
pub const DEFAULT_USER_AGENT: &str = "courseharvest/0.4";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_DELAY_MS: u64 = 500;

/// Configuration file structure. Every field is optional; defaults fill the
/// gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename, joined with the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// User agent string for HTTP scrapers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Delay between requests in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory or database file (--target flag).
    pub target: Option<PathBuf>,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the database and config.
    pub data_dir: PathBuf,
    /// Database filename inside the data directory.
    pub database: String,
    /// User agent for HTTP scrapers.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between requests in milliseconds.
    pub request_delay_ms: u64,
}

/// Look for a config file inside the data directory.
fn find_config_in(data_dir: &Path) -> Option<PathBuf> {
    for basename in ["courseharvest", "config"] {
        let path = data_dir.join(format!("{basename}.toml"));
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Resolve a target path to a data directory. A path pointing at a database
/// file means its parent directory.
fn resolve_target_to_dir(path: &Path) -> PathBuf {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };

    if path
        .extension()
        .is_some_and(|ext| ext == "db" || ext == "sqlite" || ext == "sqlite3")
    {
        path.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        path
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("courseharvest")
}

impl Settings {
    /// Load settings for the given options.
    pub fn load(options: &LoadOptions) -> anyhow::Result<Settings> {
        // Flag and environment pin the data directory before the config file
        // gets a say.
        let pinned_dir = options
            .target
            .as_deref()
            .map(resolve_target_to_dir)
            .or_else(|| {
                std::env::var("COURSEHARVEST_DATA_DIR")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(|s| resolve_target_to_dir(Path::new(&s)))
            });

        let config_path = options.config_path.clone().or_else(|| {
            find_config_in(pinned_dir.as_deref().unwrap_or(&default_data_dir()))
        });

        let config = match &config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
                let config: Config = toml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?;
                debug!(path = %path.display(), "loaded config file");
                config
            }
            None => Config::default(),
        };

        let data_dir = pinned_dir
            .or_else(|| config.data_dir.as_deref().map(|s| resolve_target_to_dir(Path::new(s))))
            .unwrap_or_else(default_data_dir);

        Ok(Settings {
            data_dir,
            database: config
                .database
                .unwrap_or_else(|| DEFAULT_DATABASE_FILENAME.to_string()),
            user_agent: config
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            request_timeout: config
                .request_timeout
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            request_delay_ms: config.request_delay_ms.unwrap_or(DEFAULT_REQUEST_DELAY_MS),
        })
    }

    /// Full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Delay between requests as a duration.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}
