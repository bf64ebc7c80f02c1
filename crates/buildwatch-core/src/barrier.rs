// ── Dispatch barrier ──
//
// Bounded fan-out with a reusable completion point. Tasks submitted with
// `execute()` run concurrently on the runtime, at most `workers` at a time;
// `await_completion()` drains everything submitted since the previous call.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, warn};

use crate::error::{AlerterError, CoreError};
use crate::lock;

/// Result of one batch of tasks.
#[derive(Debug, Default)]
pub struct BarrierOutcome {
    /// Labels of tasks that finished successfully.
    pub completed: Vec<String>,
    /// Labels and errors of tasks that failed, panicked, or never started.
    pub failures: Vec<(String, AlerterError)>,
}

impl BarrierOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failures.len()
    }
}

#[derive(Default)]
struct Batch {
    tasks: JoinSet<Result<(), AlerterError>>,
    labels: HashMap<Id, String>,
}

/// Task-tracking worker pool with an await-all barrier.
///
/// The barrier outlives individual batches: `await_completion()` may be
/// called once per broadcast cycle without recreating anything.
pub struct DispatchBarrier {
    permits: Arc<Semaphore>,
    workers: usize,
    closed: AtomicBool,
    batch: Mutex<Batch>,
}

impl DispatchBarrier {
    /// Create a barrier running at most `workers` tasks at once (minimum 1).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            closed: AtomicBool::new(false),
            batch: Mutex::new(Batch::default()),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Submit a task to the current batch. Must be called within a tokio
    /// runtime. Fails once the barrier is closed.
    pub fn execute<F>(&self, label: impl Into<String>, task: F) -> Result<(), CoreError>
    where
        F: Future<Output = Result<(), AlerterError>> + Send + 'static,
    {
        if self.is_closed() {
            return Err(CoreError::BarrierClosed);
        }

        let permits = Arc::clone(&self.permits);
        let mut batch = lock(&self.batch);
        let handle = batch.tasks.spawn(async move {
            match permits.acquire_owned().await {
                Ok(_permit) => task.await,
                Err(_) => Err(AlerterError::Rejected),
            }
        });
        batch.labels.insert(handle.id(), label.into());
        Ok(())
    }

    /// Number of tasks submitted since the last completion point.
    pub fn pending(&self) -> usize {
        lock(&self.batch).tasks.len()
    }

    /// Wait until every task submitted since the last call has finished,
    /// successfully or not.
    pub async fn await_completion(&self) -> BarrierOutcome {
        let batch = std::mem::take(&mut *lock(&self.batch));
        drain(batch).await
    }

    /// Stop accepting work and wait up to `timeout` for submitted tasks.
    /// Tasks still queued or running after the timeout are aborted.
    pub async fn close(&self, timeout: Duration) -> Result<BarrierOutcome, CoreError> {
        self.closed.store(true, Ordering::Release);
        let batch = std::mem::take(&mut *lock(&self.batch));
        let in_flight = batch.tasks.len();
        debug!(in_flight, "closing dispatch barrier");

        // Dropping the batch on timeout aborts whatever is left in it.
        let drained = tokio::time::timeout(timeout, drain(batch)).await;
        self.permits.close();
        if let Ok(outcome) = drained {
            Ok(outcome)
        } else {
            warn!(
                timeout_ms = timeout.as_millis(),
                "dispatch barrier did not drain in time, aborting tasks"
            );
            Err(CoreError::shutdown_timeout(timeout))
        }
    }

    /// Stop accepting work and abort whatever is still queued, without
    /// waiting. Returns the number of tasks aborted.
    pub fn abort(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        self.permits.close();
        let batch = std::mem::take(&mut *lock(&self.batch));
        batch.tasks.len()
    }
}

async fn drain(mut batch: Batch) -> BarrierOutcome {
    let mut outcome = BarrierOutcome::default();
    while let Some(joined) = batch.tasks.join_next_with_id().await {
        match joined {
            Ok((id, result)) => {
                let label = batch.labels.remove(&id).unwrap_or_default();
                match result {
                    Ok(()) => outcome.completed.push(label),
                    Err(err) => outcome.failures.push((label, err)),
                }
            }
            Err(err) => {
                let label = batch.labels.remove(&err.id()).unwrap_or_default();
                outcome.failures.push((label, join_failure(err)));
            }
        }
    }
    outcome
}

fn join_failure(err: JoinError) -> AlerterError {
    if err.is_panic() {
        let payload = err.into_panic();
        AlerterError::Panicked {
            message: panic_message(payload.as_ref()),
        }
    } else {
        AlerterError::failed("task cancelled")
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
