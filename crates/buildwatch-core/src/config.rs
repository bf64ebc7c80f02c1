// ── Runtime engine configuration ──
//
// Timing knobs for the alert engine. Core never reads config files;
// the CLI (via buildwatch-config) constructs an `EngineConfig` and hands it in.

use std::time::Duration;

/// Configuration for a single [`AlertEngine`](crate::AlertEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often to remind alerters of persisting state. Zero disables
    /// reminders: the engine then only reacts to changes.
    pub reminder_interval: Duration,
    /// How long `close()` waits for the background loops and in-flight
    /// alerter calls before giving up.
    pub shutdown_timeout: Duration,
    /// Pause between purge passes.
    pub purge_delay: Duration,
    /// Age past which events are purged. `None` keeps every event.
    pub purge_retention: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reminder_interval: Duration::ZERO,
            shutdown_timeout: Duration::from_secs(3),
            purge_delay: Duration::from_secs(60 * 60),
            purge_retention: None,
        }
    }
}

impl EngineConfig {
    pub fn reminders_enabled(&self) -> bool {
        !self.reminder_interval.is_zero()
    }
}
