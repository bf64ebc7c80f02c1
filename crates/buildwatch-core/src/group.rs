// ── Alerter group ──
//
// Fans one broadcast out to every configured alerter through the
// dispatch barrier, then waits for all of them. Broadcasts are serialized:
// a reminder racing an update queues behind it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::alerter::Alerter;
use crate::barrier::DispatchBarrier;
use crate::error::{AlerterError, CoreError};
use crate::model::Builds;

/// Which alerter method a broadcast invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Update,
    Clear,
    Remind,
}

/// Per-alerter results of one broadcast.
#[derive(Debug)]
pub struct DispatchReport {
    pub operation: Operation,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, AlerterError)>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The fixed set of alerters an engine notifies.
pub struct AlerterGroup {
    alerters: Vec<Arc<dyn Alerter>>,
    barrier: DispatchBarrier,
    in_flight: Mutex<()>,
}

impl AlerterGroup {
    /// One barrier worker per alerter, so a slow alerter cannot starve
    /// the others.
    pub fn new(alerters: Vec<Arc<dyn Alerter>>) -> Self {
        let barrier = DispatchBarrier::new(alerters.len());
        Self {
            alerters,
            barrier,
            in_flight: Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.alerters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.alerters.iter().map(|a| a.name()).collect()
    }

    pub async fn update(&self, builds: Arc<Builds>) -> Result<DispatchReport, CoreError> {
        self.broadcast(Operation::Update, move |alerter| {
            let builds = Arc::clone(&builds);
            async move { alerter.update(&builds).await }
        })
        .await
    }

    pub async fn clear(&self) -> Result<DispatchReport, CoreError> {
        self.broadcast(Operation::Clear, |alerter| async move { alerter.clear().await })
            .await
    }

    pub async fn remind(&self) -> Result<DispatchReport, CoreError> {
        self.broadcast(Operation::Remind, |alerter| async move { alerter.remind().await })
            .await
    }

    /// Wait for any broadcast in progress, then stop the barrier.
    pub async fn close(&self, timeout: Duration) -> Result<(), CoreError> {
        let _guard = tokio::time::timeout(timeout, self.in_flight.lock())
            .await
            .map_err(|_| CoreError::shutdown_timeout(timeout))?;
        self.barrier.close(timeout).await.map(|_| ())
    }

    /// Stop the barrier immediately, even while a broadcast holds the
    /// group. Used once a shutdown deadline has passed.
    pub fn abort(&self) -> usize {
        self.barrier.abort()
    }

    async fn broadcast<F, Fut>(
        &self,
        operation: Operation,
        call: F,
    ) -> Result<DispatchReport, CoreError>
    where
        F: Fn(Arc<dyn Alerter>) -> Fut,
        Fut: Future<Output = Result<(), AlerterError>> + Send + 'static,
    {
        let _guard = self.in_flight.lock().await;
        debug!(%operation, alerters = self.alerters.len(), "broadcasting");

        let mut submitted = Ok(());
        for alerter in &self.alerters {
            if let Err(e) = self.barrier.execute(alerter.name(), call(Arc::clone(alerter))) {
                submitted = Err(e);
                break;
            }
        }

        // Anything already submitted is awaited even if a later submit failed.
        let outcome = self.barrier.await_completion().await;
        submitted?;

        for (alerter, error) in &outcome.failures {
            warn!(%operation, alerter = %alerter, error = %error, "alerter failed");
        }

        Ok(DispatchReport {
            operation,
            succeeded: outcome.completed,
            failed: outcome.failures,
        })
    }
}
