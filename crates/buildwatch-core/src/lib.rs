//! Build state tracking and alert dispatch.
//!
//! This crate owns the in-memory model of CI build health and the
//! machinery that keeps a set of alert channels in sync with it:
//!
//! - **[`AlertEngine`]**: Holds the [`Builds`] tree behind a mutex.
//!   [`process()`](AlertEngine::process) applies incoming events and wakes
//!   a background loop that broadcasts an update, a clear, or (after a quiet
//!   reminder interval) a reminder. A second loop purges stale events.
//!   [`close()`](AlertEngine::close) stops both within a shutdown timeout.
//!
//! - **[`AlerterGroup`]**: The fixed set of [`Alerter`]s. Each broadcast
//!   runs every alerter concurrently and waits for all of them, so latency is
//!   bounded by the slowest alerter rather than the sum.
//!
//! - **[`DispatchBarrier`]**: Bounded fan-out with a reusable
//!   await-completion point, decoupled from any single broadcast.
//!
//! - **Domain model** ([`model`]): [`Event`], [`Job`], [`Build`], [`Builds`].
//!   Jobs are value-like; every snapshot leaving the engine is a deep copy.

pub mod alerter;
pub mod barrier;
pub mod config;
pub mod engine;
pub mod error;
pub mod group;
pub mod model;
pub mod processor;

use std::sync::{Mutex, MutexGuard, PoisonError};

// ── Primary re-exports ──────────────────────────────────────────────
pub use alerter::Alerter;
pub use barrier::{BarrierOutcome, DispatchBarrier};
pub use config::EngineConfig;
pub use engine::AlertEngine;
pub use error::{AlerterError, CoreError};
pub use group::{AlerterGroup, DispatchReport, Operation};
pub use processor::BuildEventProcessor;

/// Re-exported so alerter implementations need no direct dependency.
pub use async_trait::async_trait;

// Re-export model types at the crate root for ergonomics.
pub use model::{Build, BuildEvent, Builds, Event, EventKind, Job};

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
