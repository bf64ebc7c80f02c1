// ── Domain model ──
//
// Three-level tree: build name -> job name -> job state, fed by
// immutable break/fix events.

pub mod build;
pub mod event;
pub mod job;

pub use build::{Build, Builds};
pub use event::{BuildEvent, Event, EventKind};
pub use job::Job;
