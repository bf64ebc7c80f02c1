//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use buildwatch_config::ConfigError;
use buildwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const INPUT: i32 = 4;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Engine ───────────────────────────────────────────────────────

    #[error("Alert engine did not shut down within {timeout_ms}ms")]
    #[diagnostic(
        code(buildwatch::shutdown_timeout),
        help(
            "An alerter is probably hung. Raise engine.shutdown_timeout_ms\n\
             or run with -vv to see which alerter never finished."
        )
    )]
    ShutdownTimeout { timeout_ms: u64 },

    #[error("Alert engine failed: {message}")]
    #[diagnostic(code(buildwatch::engine))]
    Engine { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(buildwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(buildwatch::config),
        help("Check the config file (buildwatch config path) and BUILDWATCH_* variables.")
    )]
    Config(Box<figment::Error>),

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(buildwatch::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error("Failed to serialize configuration: {0}")]
    #[diagnostic(code(buildwatch::config_serialize))]
    ConfigSerialize(#[from] toml::ser::Error),

    // ── Input ────────────────────────────────────────────────────────

    #[error("Cannot read {path}")]
    #[diagnostic(
        code(buildwatch::input),
        help("Requests are read as JSON lines; check the path and permissions.")
    )]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(buildwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML: {0}")]
    #[diagnostic(code(buildwatch::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ShutdownTimeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config(_) | Self::ConfigExists { .. } | Self::ConfigSerialize(_) => {
                exit_code::CONFIG
            }
            Self::Input { .. } => exit_code::INPUT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Lower errors → CliError ──────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ShutdownTimeout { timeout_ms } => CliError::ShutdownTimeout { timeout_ms },
            other => CliError::Engine {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Figment(err) => CliError::Config(err),
            ConfigError::Serialization(err) => CliError::ConfigSerialize(err),
            ConfigError::Io(err) => CliError::Io(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_timeout_maps_to_timeout_exit() {
        let err = CliError::from(CoreError::ShutdownTimeout { timeout_ms: 3000 });
        assert!(matches!(err, CliError::ShutdownTimeout { timeout_ms: 3000 }));
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);
    }

    #[test]
    fn other_core_errors_are_general() {
        let err = CliError::from(CoreError::BarrierClosed);
        assert_eq!(err.exit_code(), exit_code::GENERAL);
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "engine.purge_delay_ms".into(),
            reason: "must be greater than zero".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert!(err.to_string().contains("engine.purge_delay_ms"));
    }
}
