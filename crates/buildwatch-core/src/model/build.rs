// ── Build tree: build name -> job name -> job ──
//
// Entries are created lazily on first event and only removed by an
// explicit delete. Clearing resets events but keeps the entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::event::{BuildEvent, Event};
use super::job::Job;

/// A named CI pipeline and its jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub name: String,
    #[serde(default)]
    pub jobs: BTreeMap<String, Job>,
}

impl Build {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: BTreeMap::new(),
        }
    }

    /// Copy of the named job, or an empty job with that name.
    pub fn job(&self, name: &str) -> Job {
        self.jobs
            .get(name)
            .cloned()
            .unwrap_or_else(|| Job::new(name))
    }

    /// Apply an event to the named job, creating it if needed. Returns the
    /// job's latest event from before the update.
    pub fn apply(&mut self, job: &str, event: Event) -> Option<Event> {
        let entry = self
            .jobs
            .entry(job.to_owned())
            .or_insert_with(|| Job::new(job));
        let previous = entry.latest_event().cloned();
        *entry = entry.with_event(event);
        previous
    }

    /// Clear events from every job.
    pub fn clear(&mut self) {
        for job in self.jobs.values_mut() {
            *job = job.cleared();
        }
    }

    /// Clear events from one job. Unknown jobs are left alone.
    pub fn clear_job(&mut self, name: &str) {
        if let Some(job) = self.jobs.get_mut(name) {
            *job = job.cleared();
        }
    }

    /// Remove one job. Returns whether it existed.
    pub fn delete_job(&mut self, name: &str) -> bool {
        self.jobs.remove(name).is_some()
    }

    pub(crate) fn purge(&mut self, cutoff: i64) {
        for job in self.jobs.values_mut() {
            *job = job.purged(cutoff);
        }
    }

    pub fn is_broken(&self) -> bool {
        self.jobs.values().any(Job::is_broken)
    }

    pub fn broken_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values().filter(|job| job.is_broken())
    }
}

/// Root aggregate of all tracked builds.
///
/// `Clone` is a full structural copy: the engine hands clones out as
/// point-in-time snapshots that callers may mutate freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Builds {
    #[serde(default)]
    pub builds: BTreeMap<String, Build>,
}

impl Builds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the named build, or an empty build with that name.
    pub fn build(&self, name: &str) -> Build {
        self.builds
            .get(name)
            .cloned()
            .unwrap_or_else(|| Build::new(name))
    }

    /// Copy of the named job, or an empty job with that name.
    pub fn job(&self, build: &str, job: &str) -> Job {
        self.builds
            .get(build)
            .map_or_else(|| Job::new(job), |b| b.job(job))
    }

    /// Apply one build event, creating the build and job if needed.
    /// Returns the job's latest event from before the update.
    pub fn apply(&mut self, event: &BuildEvent) -> Option<Event> {
        self.builds
            .entry(event.build.clone())
            .or_insert_with(|| Build::new(event.build.as_str()))
            .apply(&event.job, event.event.clone())
    }

    /// Clear events everywhere (`build` is `None`), in one build (`job` is
    /// `None`), or in one job. Entries are kept.
    pub fn clear(&mut self, build: Option<&str>, job: Option<&str>) {
        match (build, job) {
            (None, _) => {
                for b in self.builds.values_mut() {
                    b.clear();
                }
            }
            (Some(build), None) => {
                if let Some(b) = self.builds.get_mut(build) {
                    b.clear();
                }
            }
            (Some(build), Some(job)) => {
                if let Some(b) = self.builds.get_mut(build) {
                    b.clear_job(job);
                }
            }
        }
    }

    /// Delete every build (`build` is `None`), one build (`job` is `None`),
    /// or one job. Returns whether anything was removed.
    pub fn delete(&mut self, build: Option<&str>, job: Option<&str>) -> bool {
        match (build, job) {
            (None, _) => {
                let removed = !self.builds.is_empty();
                self.builds.clear();
                removed
            }
            (Some(build), None) => self.builds.remove(build).is_some(),
            (Some(build), Some(job)) => self
                .builds
                .get_mut(build)
                .is_some_and(|b| b.delete_job(job)),
        }
    }

    /// Drop events older than `cutoff` (ms since the epoch) from every job.
    pub fn purge(&mut self, cutoff: i64) {
        for build in self.builds.values_mut() {
            build.purge(cutoff);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    /// Every broken job, paired with its build name, in name order.
    pub fn broken_jobs(&self) -> Vec<(&str, &Job)> {
        self.builds
            .values()
            .flat_map(|b| b.broken_jobs().map(move |job| (b.name.as_str(), job)))
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.builds
            .values()
            .flat_map(|b| b.jobs.values())
            .map(|job| usize::from(job.last_break.is_some()) + usize::from(job.last_fix.is_some()))
            .sum()
    }
}
