// ── Core error types ──
//
// Alerter failures are caught per task and reported, never propagated
// to callers of the engine. `CoreError` covers lifecycle problems:
// shutdown, cancellation, and a barrier used after close.

use thiserror::Error;

/// Failure of a single alerter call.
#[derive(Debug, Error)]
pub enum AlerterError {
    #[error("{message}")]
    Failed { message: String },

    #[error("alerter task panicked: {message}")]
    Panicked { message: String },

    #[error("alerter task did not start: dispatch barrier closed")]
    Rejected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AlerterError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("shutdown did not complete within {timeout_ms}ms")]
    ShutdownTimeout { timeout_ms: u64 },

    #[error("dispatch barrier is closed")]
    BarrierClosed,

    #[error("operation cancelled by shutdown")]
    Cancelled,
}

impl CoreError {
    pub(crate) fn shutdown_timeout(timeout: std::time::Duration) -> Self {
        Self::ShutdownTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
