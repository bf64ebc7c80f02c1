// ── Alert engine ──
//
// Owns the build tree behind a mutex and drives the alerter group from a
// dedicated loop task. Callers only ever take the mutex briefly; alerter
// I/O happens on the loop task and the barrier's workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerter::Alerter;
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::group::{AlerterGroup, DispatchReport};
use crate::lock;
use crate::model::{Build, BuildEvent, Builds, Event, EventKind, Job};

// ── AlertEngine ──────────────────────────────────────────────────

/// Thread-safe build state plus the background loops that alert on it.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Every value handed out
/// (`builds()`, broadcast snapshots) is a structural copy, so nobody but
/// the engine ever touches the live tree.
#[derive(Clone)]
pub struct AlertEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    state: Mutex<EngineState>,
    /// Wakes the alert loop. A notification sent while the loop is busy
    /// is stored and consumed by its next wait.
    wake: Notify,
    group: AlerterGroup,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

#[derive(Default)]
struct EngineState {
    builds: Builds,
    changed: bool,
}

impl EngineState {
    /// Flag a change for the alert loop. Call with the state lock held.
    fn signal(&mut self, wake: &Notify) {
        self.changed = true;
        wake.notify_one();
    }
}

impl AlertEngine {
    /// Create the engine and spawn its alert and purge loops on the
    /// current tokio runtime. Call [`close()`](Self::close) to stop them.
    pub fn start(config: EngineConfig, alerters: Vec<Arc<dyn Alerter>>) -> Self {
        let cancel = CancellationToken::new();
        let engine = Self {
            inner: Arc::new(EngineInner {
                group: AlerterGroup::new(alerters),
                config,
                state: Mutex::new(EngineState::default()),
                wake: Notify::new(),
                cancel: cancel.clone(),
                task_handles: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        };

        let mut handles = Vec::with_capacity(2);
        handles.push(tokio::spawn(alert_task(engine.clone(), cancel.clone())));

        let purge_delay = engine.inner.config.purge_delay;
        if purge_delay.is_zero() {
            debug!("purge loop disabled");
        } else {
            handles.push(tokio::spawn(purge_task(engine.clone(), purge_delay, cancel)));
        }
        *lock(&engine.inner.task_handles) = handles;

        info!(
            alerters = engine.inner.group.len(),
            reminder_ms = engine.inner.config.reminder_interval.as_millis(),
            "alert engine started"
        );
        engine
    }

    /// Access the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Names of the configured alerters.
    pub fn alerters(&self) -> Vec<&str> {
        self.inner.group.names()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    // ── Ingestion ────────────────────────────────────────────────

    /// Apply new build events. Unknown builds and jobs are created.
    ///
    /// Any break, and any event following a break, wakes the alert loop:
    /// a job that stays broken keeps re-announcing who is responsible,
    /// while a fix on an already fixed job stays quiet.
    pub fn process(&self, events: &[BuildEvent]) {
        info!(events = events.len(), "processing build events");
        let mut state = lock(&self.inner.state);
        let mut changed = false;
        for event in events {
            let previous = state.builds.apply(event);
            debug!(%event, "applied");
            if event.event.is_broken() || previous.as_ref().is_some_and(Event::is_broken) {
                changed = true;
            }
        }
        if changed {
            state.signal(&self.inner.wake);
        }
    }

    /// Record a break stamped with the current time.
    pub fn broken<I, S>(&self, build: &str, job: &str, responsible: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let event = Event::now(EventKind::Broken, responsible);
        self.process(&[BuildEvent::new(build, job, event)]);
    }

    /// Record a fix stamped with the current time.
    pub fn fixed<I, S>(&self, build: &str, job: &str, responsible: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let event = Event::now(EventKind::Fixed, responsible);
        self.process(&[BuildEvent::new(build, job, event)]);
    }

    // ── Snapshots ────────────────────────────────────────────────

    /// Copy of the whole tree.
    pub fn builds(&self) -> Builds {
        lock(&self.inner.state).builds.clone()
    }

    /// Copy of one build; empty if unknown.
    pub fn build(&self, build: &str) -> Build {
        lock(&self.inner.state).builds.build(build)
    }

    /// Copy of one job; empty if unknown.
    pub fn job(&self, build: &str, job: &str) -> Job {
        lock(&self.inner.state).builds.job(build, job)
    }

    // ── Administration ───────────────────────────────────────────

    /// Clear events: everywhere when `build` is `None`, in one build when
    /// `job` is `None`, otherwise in one job. Entries stay. Always alerts.
    pub fn clear(&self, build: Option<&str>, job: Option<&str>) {
        debug!(?build, ?job, "clearing events");
        let mut state = lock(&self.inner.state);
        state.builds.clear(build, job);
        state.signal(&self.inner.wake);
    }

    /// Delete builds or jobs with the same selection as [`clear`](Self::clear).
    /// Never alerts.
    pub fn delete(&self, build: Option<&str>, job: Option<&str>) {
        debug!(?build, ?job, "deleting");
        let removed = lock(&self.inner.state).builds.delete(build, job);
        if !removed {
            debug!(?build, ?job, "nothing to delete");
        }
    }

    /// Drop events older than the configured retention. Never alerts.
    pub fn purge(&self) {
        let Some(retention) = self.inner.config.purge_retention else {
            debug!("no purge retention configured, keeping all events");
            return;
        };
        let retention_ms = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp_millis().saturating_sub(retention_ms);
        info!(cutoff, "purging events");
        lock(&self.inner.state).builds.purge(cutoff);
    }

    // ── Shutdown ─────────────────────────────────────────────────

    /// Stop both loops and the alerter group, waiting up to the configured
    /// shutdown timeout. Later calls return `Ok(())` immediately.
    pub async fn close(&self) -> Result<(), CoreError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!("alert engine already closed");
            return Ok(());
        }

        info!("closing the alert engine");
        let timeout = self.inner.config.shutdown_timeout;
        let deadline = Instant::now() + timeout;
        self.inner.cancel.cancel();

        let handles = std::mem::take(&mut *lock(&self.inner.task_handles));
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let joined = tokio::time::timeout_at(deadline, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "background task ended abnormally");
                }
            }
        })
        .await;

        if joined.is_err() {
            for abort in aborts {
                abort.abort();
            }
            let aborted = self.inner.group.abort();
            warn!(
                timeout_ms = timeout.as_millis(),
                aborted, "alert engine did not shut down in time"
            );
            return Err(CoreError::shutdown_timeout(timeout));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.inner.group.close(remaining).await {
            Ok(()) => {
                info!("alert engine shut down");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "alerter group did not shut down in time");
                Err(CoreError::shutdown_timeout(timeout))
            }
        }
    }

    // ── Alert loop internals ─────────────────────────────────────

    /// Take a snapshot and reset the change flag in one critical section.
    fn take_changed(&self) -> Option<Builds> {
        let mut state = lock(&self.inner.state);
        if state.changed {
            state.changed = false;
            Some(state.builds.clone())
        } else {
            None
        }
    }

    /// Block until the tree changes. `Ok(None)` means the reminder
    /// interval passed with no change. Once cancelled, no further snapshot
    /// is taken even if a change is pending.
    async fn wait_for_change(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Builds>, CoreError> {
        let reminder = self.inner.config.reminder_interval;
        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            if let Some(snapshot) = self.take_changed() {
                return Ok(Some(snapshot));
            }
            if reminder.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(CoreError::Cancelled),
                    () = self.inner.wake.notified() => {}
                }
            } else {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(CoreError::Cancelled),
                    () = self.inner.wake.notified() => {}
                    () = tokio::time::sleep(reminder) => return Ok(self.take_changed()),
                }
            }
        }
    }

    /// Remind on `None`, clear on an empty tree, update otherwise.
    async fn dispatch(&self, snapshot: Option<Builds>) -> Result<DispatchReport, CoreError> {
        let group = &self.inner.group;
        match snapshot {
            None => {
                debug!("no change within reminder interval");
                group.remind().await
            }
            Some(builds) if builds.is_empty() => {
                debug!("build tree empty, clearing alerters");
                group.clear().await
            }
            Some(builds) => {
                debug!(
                    builds = builds.len(),
                    broken = builds.broken_jobs().len(),
                    "alerting for builds"
                );
                group.update(Arc::new(builds)).await
            }
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Waits for changes and broadcasts update, clear, or remind. A failed
/// cycle is logged and the loop carries on; only cancellation ends it.
/// A broadcast already in flight is allowed to finish.
async fn alert_task(engine: AlertEngine, cancel: CancellationToken) {
    loop {
        debug!("waiting for signal");
        let Ok(snapshot) = engine.wait_for_change(&cancel).await else {
            break;
        };

        match engine.dispatch(snapshot).await {
            Ok(report) if report.is_clean() => {
                debug!(
                    operation = %report.operation,
                    alerters = report.succeeded.len(),
                    "broadcast complete"
                );
            }
            Ok(report) => {
                warn!(
                    operation = %report.operation,
                    succeeded = report.succeeded.len(),
                    failed = report.failed.len(),
                    "broadcast completed with failures"
                );
            }
            Err(e) => error!(error = %e, "alert cycle failed"),
        }
    }
    debug!("alert loop stopped");
}

/// Purges stale events every `delay`.
async fn purge_task(engine: AlertEngine, delay: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => engine.purge(),
        }
    }
    debug!("purge loop stopped");
}
