// ── Job state ──

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::event::{Event, EventKind};

/// Health of a single job, derived from its latest break and fix.
///
/// Value-like: every mutation returns a new `Job` built from the old one
/// plus an event, so a copy handed out earlier never changes underneath
/// its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub last_break: Option<Event>,
    pub last_fix: Option<Event>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_break: None,
            last_fix: None,
        }
    }

    /// Broken when the latest break is strictly after the latest fix, or
    /// there has been no fix at all.
    pub fn is_broken(&self) -> bool {
        match (&self.last_break, &self.last_fix) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(brk), Some(fix)) => brk.is_after(fix),
        }
    }

    /// The event that currently decides this job's state. A fix wins a tie.
    pub fn latest_event(&self) -> Option<&Event> {
        if self.is_broken() {
            self.last_break.as_ref()
        } else {
            self.last_fix.as_ref()
        }
    }

    /// Who is held responsible for the current failure. Empty when fixed.
    pub fn responsible(&self) -> BTreeSet<String> {
        match &self.last_break {
            Some(brk) if self.is_broken() => brk.responsible.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn has_events(&self) -> bool {
        self.last_break.is_some() || self.last_fix.is_some()
    }

    /// Apply an event according to its kind.
    pub fn with_event(&self, event: Event) -> Job {
        match event.kind {
            EventKind::Broken => self.broken(event),
            EventKind::Fixed => self.fixed(event),
        }
    }

    /// Record a break. A break arriving while the job is already broken
    /// accumulates responsibility; an out-of-date break is ignored.
    pub fn broken(&self, event: Event) -> Job {
        let event = Event {
            kind: EventKind::Broken,
            ..event
        };
        let last_break = match &self.last_break {
            Some(current) if current.is_after(&event) => current.clone(),
            Some(current) if self.is_broken() => event.merged_with(current),
            _ => event,
        };
        Job {
            name: self.name.clone(),
            last_break: Some(last_break),
            last_fix: self.last_fix.clone(),
        }
    }

    /// Record a fix. Only the newest fix is kept.
    pub fn fixed(&self, event: Event) -> Job {
        let event = Event {
            kind: EventKind::Fixed,
            ..event
        };
        let last_fix = match &self.last_fix {
            Some(current) if current.is_after(&event) => current.clone(),
            _ => event,
        };
        Job {
            name: self.name.clone(),
            last_break: self.last_break.clone(),
            last_fix: Some(last_fix),
        }
    }

    /// Same job with no events.
    pub fn cleared(&self) -> Job {
        Job::new(self.name.clone())
    }

    /// Drop events older than `cutoff` (ms). The break behind a current
    /// failure is always kept, so purging never changes `is_broken()`.
    pub fn purged(&self, cutoff: i64) -> Job {
        let recent = |event: &Option<Event>| {
            event
                .as_ref()
                .filter(|e| e.timestamp >= cutoff)
                .cloned()
        };
        let last_break = if self.is_broken() {
            self.last_break.clone()
        } else {
            recent(&self.last_break)
        };
        Job {
            name: self.name.clone(),
            last_break,
            last_fix: recent(&self.last_fix),
        }
    }
}
