// ── Build event domain types ──
//
// Events are immutable records. Jobs are rebuilt from them, never
// mutated in place, so snapshots can be shared freely.

use std::collections::BTreeSet;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Whether an event reports a failure or a recovery.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EventKind {
    Broken,
    Fixed,
}

/// A timestamped break or fix notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub kind: EventKind,
    /// Identifiers of whoever is held responsible (committers, owners).
    #[serde(default)]
    pub responsible: BTreeSet<String>,
}

impl Event {
    pub fn new<I, S>(timestamp: i64, kind: EventKind, responsible: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            timestamp,
            kind,
            responsible: responsible.into_iter().map(Into::into).collect(),
        }
    }

    pub fn broken<I, S>(timestamp: i64, responsible: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(timestamp, EventKind::Broken, responsible)
    }

    pub fn fixed<I, S>(timestamp: i64, responsible: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(timestamp, EventKind::Fixed, responsible)
    }

    /// Same event stamped with the current wall-clock time.
    pub fn now<I, S>(kind: EventKind, responsible: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Utc::now().timestamp_millis(), kind, responsible)
    }

    /// Strictly later than `other`. Simultaneous events do not supersede
    /// each other.
    pub fn is_after(&self, other: &Event) -> bool {
        self.timestamp > other.timestamp
    }

    pub fn is_broken(&self) -> bool {
        self.kind == EventKind::Broken
    }

    /// A copy carrying the responsible parties of both events, stamped
    /// with this event's timestamp.
    pub(crate) fn merged_with(&self, earlier: &Event) -> Event {
        Event {
            timestamp: self.timestamp,
            kind: self.kind,
            responsible: self
                .responsible
                .union(&earlier.responsible)
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.timestamp)?;
        if !self.responsible.is_empty() {
            let names: Vec<&str> = self.responsible.iter().map(String::as_str).collect();
            write!(f, " by {}", names.join(", "))?;
        }
        Ok(())
    }
}

/// An event addressed to a job within a build, as produced by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub build: String,
    pub job: String,
    #[serde(flatten)]
    pub event: Event,
}

impl BuildEvent {
    pub fn new(build: impl Into<String>, job: impl Into<String>, event: Event) -> Self {
        Self {
            build: build.into(),
            job: job.into(),
            event,
        }
    }
}

impl fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.build, self.job, self.event)
    }
}
