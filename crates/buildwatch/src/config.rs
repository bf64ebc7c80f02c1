//! CLI configuration -- thin wrapper around `buildwatch_config`.
//!
//! Adds resolution that respects `GlobalOpts` (`--config`) and per-command
//! flag overrides.

use std::path::PathBuf;
use std::time::Duration;

use buildwatch_core::EngineConfig;

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use buildwatch_config::{Config, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// The config file in effect: `--config` if given, else the platform path.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(buildwatch_config::config_path)
}

/// Load the effective config (file + environment).
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config(Some(&active_path(global)))?)
}

/// Engine settings with `run` flag overrides applied.
pub fn engine_config(cfg: &Config, args: &RunArgs) -> Result<EngineConfig, CliError> {
    let mut engine = cfg.engine_config()?;
    if let Some(ms) = args.reminder_ms {
        engine.reminder_interval = Duration::from_millis(ms);
    }
    Ok(engine)
}
