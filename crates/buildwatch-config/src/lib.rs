//! Configuration for buildwatch.
//!
//! One TOML file with an environment overlay, translated into
//! `buildwatch_core::EngineConfig` plus the settings of the built-in
//! alerters. The CLI layers flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use buildwatch_core::EngineConfig;

/// Prefix of environment overrides, e.g. `BUILDWATCH_ENGINE__REMINDER_MS`.
pub const ENV_PREFIX: &str = "BUILDWATCH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Alert engine timing.
    #[serde(default)]
    pub engine: EngineSection,

    /// Built-in alerters.
    #[serde(default)]
    pub alerters: AlertersSection,
}

/// Engine timing, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSection {
    /// Quiet period before a reminder; 0 disables reminders.
    #[serde(default)]
    pub reminder_ms: u64,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    #[serde(default = "default_purge_delay_ms")]
    pub purge_delay_ms: u64,

    /// Age beyond which purge drops events. Unset keeps everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_retention_ms: Option<u64>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            reminder_ms: 0,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            purge_delay_ms: default_purge_delay_ms(),
            purge_retention_ms: None,
        }
    }
}

fn default_shutdown_timeout_ms() -> u64 {
    3_000
}
fn default_purge_delay_ms() -> u64 {
    3_600_000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AlertersSection {
    /// Log a summary of broken jobs through tracing.
    #[serde(default = "default_true")]
    pub log: bool,

    /// Keep a JSON copy of the latest build tree at this path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_file: Option<PathBuf>,
}

impl Default for AlertersSection {
    fn default() -> Self {
        Self {
            log: true,
            status_file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Check values that parse but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.purge_delay_ms == 0 {
            return Err(ConfigError::Validation {
                field: "engine.purge_delay_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.engine.purge_retention_ms == Some(0) {
            return Err(ConfigError::Validation {
                field: "engine.purge_retention_ms".into(),
                reason: "must be greater than zero; omit it to keep all events".into(),
            });
        }
        if self
            .alerters
            .status_file
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::Validation {
                field: "alerters.status_file".into(),
                reason: "path is empty".into(),
            });
        }
        Ok(())
    }

    /// Validated engine settings.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        self.validate()?;
        let engine = &self.engine;
        Ok(EngineConfig {
            reminder_interval: Duration::from_millis(engine.reminder_ms),
            shutdown_timeout: Duration::from_millis(engine.shutdown_timeout_ms),
            purge_delay: Duration::from_millis(engine.purge_delay_ms),
            purge_retention: engine.purge_retention_ms.map(Duration::from_millis),
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "buildwatch", "buildwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("buildwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file at `path` if it exists.
pub fn file_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
}

/// Load config from `path` (or the canonical path) plus the environment.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let figment = file_figment(&path).merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning a default if anything goes wrong.
pub fn load_config_or_default(path: Option<&Path>) -> Config {
    load_config(path).unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path` (or the canonical path).
/// Returns the path written.
pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(path)
}
