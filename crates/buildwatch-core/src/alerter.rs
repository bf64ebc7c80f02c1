//! Alerter capability.
//!
//! An alerter is an output channel (lights, audio, a dashboard, a status
//! file) told about build state. The engine never calls alerters directly;
//! it goes through an [`AlerterGroup`](crate::AlerterGroup), which runs
//! every alerter concurrently and waits for all of them.

use async_trait::async_trait;

use crate::error::AlerterError;
use crate::model::Builds;

/// Trait for alert channels.
///
/// Calls for different alerters run concurrently, so implementations must
/// not share mutable state with each other. A slow call delays only its own
/// slot in the current broadcast.
#[async_trait]
pub trait Alerter: Send + Sync {
    /// Name used in logs and dispatch reports.
    fn name(&self) -> &str;

    /// Build state changed; `builds` is a snapshot the alerter may keep.
    async fn update(&self, builds: &Builds) -> Result<(), AlerterError>;

    /// All state was wiped; reset to the idle state.
    async fn clear(&self) -> Result<(), AlerterError>;

    /// Nothing changed for a reminder interval; re-announce any failures.
    async fn remind(&self) -> Result<(), AlerterError>;
}
