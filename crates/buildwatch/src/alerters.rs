//! Built-in alerters that need no hardware: a tracing log and a JSON
//! status file.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use buildwatch_config::AlertersSection;
use buildwatch_core::{Alerter, AlerterError, Builds, async_trait};

/// Instantiate the alerters enabled in the config.
pub fn from_config(section: &AlertersSection) -> Vec<Arc<dyn Alerter>> {
    let mut alerters: Vec<Arc<dyn Alerter>> = Vec::new();
    if section.log {
        alerters.push(Arc::new(LogAlerter::new()));
    }
    if let Some(ref path) = section.status_file {
        alerters.push(Arc::new(StatusFileAlerter::new(path.clone())));
    }
    alerters
}

// ── Log ──────────────────────────────────────────────────────────────

/// Reports broken jobs through `tracing`. Remembers the last snapshot so
/// reminders can repeat the list.
#[derive(Default)]
pub struct LogAlerter {
    last: Mutex<Option<Builds>>,
}

impl LogAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `build/job (responsible)` for every broken job of the last snapshot.
    fn broken_summary(&self) -> Vec<String> {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        last.as_ref().map_or_else(Vec::new, |builds| {
            builds
                .broken_jobs()
                .into_iter()
                .map(|(build, job)| {
                    let who: Vec<String> = job.responsible().into_iter().collect();
                    if who.is_empty() {
                        format!("{build}/{}", job.name)
                    } else {
                        format!("{build}/{} ({})", job.name, who.join(", "))
                    }
                })
                .collect()
        })
    }
}

#[async_trait]
impl Alerter for LogAlerter {
    fn name(&self) -> &str {
        "log"
    }

    async fn update(&self, builds: &Builds) -> Result<(), AlerterError> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(builds.clone());
        let broken = self.broken_summary();
        if broken.is_empty() {
            info!(builds = builds.len(), "all jobs healthy");
        } else {
            warn!(broken = broken.len(), jobs = %broken.join("; "), "jobs broken");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), AlerterError> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
        info!("build state cleared");
        Ok(())
    }

    async fn remind(&self) -> Result<(), AlerterError> {
        let broken = self.broken_summary();
        if broken.is_empty() {
            debug!("reminder: nothing broken");
        } else {
            warn!(broken = broken.len(), jobs = %broken.join("; "), "reminder: jobs still broken");
        }
        Ok(())
    }
}

// ── Status file ──────────────────────────────────────────────────────

/// Keeps a pretty-printed JSON copy of the latest snapshot on disk.
/// Writes go to a sibling temp file first, then replace the target.
pub struct StatusFileAlerter {
    path: PathBuf,
}

impl StatusFileAlerter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn write(&self, builds: &Builds) -> Result<(), AlerterError> {
        let body = serde_json::to_vec_pretty(builds)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), "status file written");
        Ok(())
    }
}

#[async_trait]
impl Alerter for StatusFileAlerter {
    fn name(&self) -> &str {
        "status-file"
    }

    async fn update(&self, builds: &Builds) -> Result<(), AlerterError> {
        self.write(builds).await
    }

    async fn clear(&self) -> Result<(), AlerterError> {
        self.write(&Builds::new()).await
    }

    async fn remind(&self) -> Result<(), AlerterError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use buildwatch_core::{BuildEvent, Event};
    use pretty_assertions::assert_eq;

    fn broken_tree() -> Builds {
        let mut builds = Builds::new();
        builds.apply(&BuildEvent::new("bolt", "smoke", Event::broken(10, ["alice", "bob"])));
        builds.apply(&BuildEvent::new("bolt", "unit", Event::fixed(10, ["carol"])));
        builds
    }

    #[test]
    fn config_selects_alerters() {
        let mut section = AlertersSection::default();
        let names = |s: &AlertersSection| {
            from_config(s)
                .iter()
                .map(|a| a.name().to_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&section), vec!["log"]);

        section.status_file = Some(PathBuf::from("status.json"));
        assert_eq!(names(&section), vec!["log", "status-file"]);

        section.log = false;
        assert_eq!(names(&section), vec!["status-file"]);
    }

    #[tokio::test]
    async fn log_alerter_remembers_broken_jobs_until_cleared() {
        let alerter = LogAlerter::new();
        assert!(alerter.broken_summary().is_empty());

        alerter.update(&broken_tree()).await.unwrap();
        assert_eq!(alerter.broken_summary(), vec!["bolt/smoke (alice, bob)"]);
        alerter.remind().await.unwrap();

        alerter.clear().await.unwrap();
        assert!(alerter.broken_summary().is_empty());
    }

    #[tokio::test]
    async fn status_file_tracks_updates_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("status.json");
        let alerter = StatusFileAlerter::new(path.clone());

        alerter.update(&broken_tree()).await.unwrap();
        let written: Builds = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, broken_tree());
        assert!(!dir.path().join("out").join("status.json.tmp").exists());

        alerter.remind().await.unwrap();
        let unchanged: Builds = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(unchanged, broken_tree());

        alerter.clear().await.unwrap();
        let cleared: Builds = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(cleared.is_empty());
    }

    #[tokio::test]
    async fn unwritable_status_file_is_an_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the final rename fail.
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("child"), b"x").unwrap();

        let alerter = StatusFileAlerter::new(path);
        let err = alerter.update(&broken_tree()).await.unwrap_err();
        assert!(matches!(err, AlerterError::Io(_)));
    }
}
