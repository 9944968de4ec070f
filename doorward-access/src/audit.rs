//! Fire-and-forget audit dispatch.
//!
//! Every decision schedules exactly one detached unit of work. The request
//! never waits on it; failures are logged and dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use doorward_core::traits::{AuditSink, ScheduleGateway};
use doorward_core::types::{AuditRecord, Credential};

/// Spawns and tracks background audit work.
///
/// There is no bound on in-flight tasks: a slow sink under sustained load
/// grows the tracked set without limit.
#[derive(Clone)]
pub struct AuditDispatcher {
    sink: Arc<dyn AuditSink>,
    tracker: TaskTracker,
}

impl AuditDispatcher {
    /// Creates a dispatcher writing to `sink`.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            tracker: TaskTracker::new(),
        }
    }

    /// Appends `record` in the background.
    pub fn submit(&self, record: AuditRecord) {
        self.submit_then(record, std::future::ready(()));
    }

    /// Appends `record`, then runs `then`, as one background unit.
    pub fn submit_then<F>(&self, record: AuditRecord, then: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sink = self.sink.clone();
        self.spawn(async move {
            write(sink.as_ref(), record).await;
            then.await;
        });
    }

    /// Attributes a denied attempt in the background.
    ///
    /// Looks up who owns the key and which room the sensor guards. A failed
    /// or empty lookup writes nothing.
    pub fn submit_denied(
        &self,
        gateway: Arc<dyn ScheduleGateway>,
        credential: Credential,
        reason: String,
    ) {
        let sink = self.sink.clone();
        self.spawn(async move {
            let identity = match gateway
                .find_identity(&credential.sensor_id, &credential.key)
                .await
            {
                Ok(Some(identity)) => identity,
                Ok(None) => {
                    warn!(
                        sensor_id = %credential.sensor_id,
                        "Unknown credential, denied attempt not logged"
                    );
                    return;
                }
                Err(e) => {
                    warn!(
                        sensor_id = %credential.sensor_id,
                        error = %e,
                        "Identity lookup failed, denied attempt not logged"
                    );
                    return;
                }
            };

            let record = AuditRecord::denied(&identity, credential.kind, reason);
            write(sink.as_ref(), record).await;
        });
    }

    /// Runs arbitrary post-decision work on the same tracker.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    /// Number of background tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Closes the tracker and waits up to `grace` for running tasks.
    ///
    /// Returns true if everything finished; tasks still running after the
    /// grace period are abandoned.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            debug!(pending, "Draining background audit tasks");
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    abandoned = self.tracker.len(),
                    grace_secs = grace.as_secs(),
                    "Background tasks still running after grace period"
                );
                false
            }
        }
    }
}

async fn write(sink: &dyn AuditSink, record: AuditRecord) {
    let user_id = record.user_id.clone();
    let granted = record.granted;
    if let Err(e) = sink.record(record).await {
        error!(user_id = %user_id, granted, error = %e, "Failed to write audit record");
    }
}
