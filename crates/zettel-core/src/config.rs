//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/zettel/config.toml)
//! 3. Environment variables (ZETTEL_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Environment variable prefix
const ENV_PREFIX: &str = "ZETTEL";

/// Upper bound of the pause between allocation attempts
const MAX_ALLOCATION_BACKOFF: Duration = Duration::from_secs(1);

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the note directory tree
    #[serde(default = "default_notes_dir")]
    pub notes_dir: PathBuf,

    /// Seconds between full rescans of the note directory
    #[serde(default = "default_rescan_interval_secs")]
    pub rescan_interval_secs: u64,

    /// Quiet period before touched files are reported
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Candidates tried before allocating a new id fails
    #[serde(default = "default_allocation_attempts")]
    pub allocation_attempts: u32,

    /// Initial pause between allocation attempts, doubled each time
    #[serde(default = "default_allocation_backoff_ms")]
    pub allocation_backoff_ms: u64,

    /// Log file path (stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notes_dir: default_notes_dir(),
            rescan_interval_secs: default_rescan_interval_secs(),
            debounce_ms: default_debounce_ms(),
            allocation_attempts: default_allocation_attempts(),
            allocation_backoff_ms: default_allocation_backoff_ms(),
            log_file: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (ZETTEL_NOTES_DIR, ZETTEL_RESCAN_INTERVAL, ...)
    /// 2. Config file (~/.config/zettel/config.toml or ZETTEL_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit `--config` path
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // ZETTEL_NOTES_DIR
        if let Ok(val) = std::env::var(format!("{}_NOTES_DIR", ENV_PREFIX)) {
            self.notes_dir = PathBuf::from(val);
        }

        // ZETTEL_RESCAN_INTERVAL
        if let Some(secs) = env_number("RESCAN_INTERVAL") {
            self.rescan_interval_secs = secs;
        }

        // ZETTEL_DEBOUNCE_MS
        if let Some(ms) = env_number("DEBOUNCE_MS") {
            self.debounce_ms = ms;
        }

        // ZETTEL_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        // ZETTEL_LOG_LEVEL
        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }
    }

    /// Ensure the notes directory exists
    pub fn ensure_notes_dir(&self) -> Result<()> {
        if !self.notes_dir.exists() {
            std::fs::create_dir_all(&self.notes_dir).with_context(|| {
                format!("Failed to create notes directory: {:?}", self.notes_dir)
            })?;
        }
        Ok(())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with ZETTEL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("zettel")
            .join("config.toml")
    }

    /// Period of the full rescan, at least one second
    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Number of allocation attempts, at least one
    pub fn allocation_attempts(&self) -> u32 {
        self.allocation_attempts.max(1)
    }

    /// Initial allocation backoff, capped at one second
    pub fn allocation_backoff(&self) -> Duration {
        Duration::from_millis(self.allocation_backoff_ms).min(MAX_ALLOCATION_BACKOFF)
    }
}

/// Read a numeric `ZETTEL_*` variable, ignoring values that do not parse
fn env_number(suffix: &str) -> Option<u64> {
    let name = format!("{}_{}", ENV_PREFIX, suffix);
    let val = std::env::var(&name).ok()?;
    match val.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a number", name, val);
            None
        }
    }
}

/// Get the default notes directory
fn default_notes_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zettel")
        .join("notes")
}

fn default_rescan_interval_secs() -> u64 {
    600
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_allocation_attempts() -> u32 {
    32
}

fn default_allocation_backoff_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}
