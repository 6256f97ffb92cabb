//! Job Queue (§4.5): the top-level scheduler. Single-threaded
//! serializable state guarded by one async mutex; job execution itself
//! runs on a spawned task so `enqueue`/`cancel` never block on a full
//! graph run.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leaxer_core::domain::{ComputeBackend, Job, JobStatus, NodeOutput, WorkflowSnapshot};
use leaxer_core::events::AppEvent;
use leaxer_core::ports::{EventBusPort, PersistedQueueState, QueueError, QueueStorePort};
use leaxer_core::utils::new_job_id;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use super::batching::reorder_pending;
use crate::graph::GraphRuntime;

const CRASH_RECOVERY_MESSAGE: &str = "Process terminated (server restart)";
const RESCHEDULE_DELAY: Duration = Duration::from_millis(100);
const PENDING_PREVIEW: usize = 10;
const FINISHED_PREVIEW: usize = 20;

/// A terminal job outcome, pushed to whatever client registered via
/// `set_socket` in addition to the Event Bus publish.
#[derive(Debug, Clone)]
pub enum JobNotification {
    Completed {
        job_id: String,
        outputs: std::collections::HashMap<String, NodeOutput>,
    },
    Error {
        job_id: String,
        error: String,
    },
}

/// Client-facing view of the queue, per §4.5's `get_state` contract.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub running: Option<Job>,
    pub pending: Vec<Job>,
    pub finished: Vec<Job>,
    pub pending_count: usize,
    pub total_count: usize,
}

struct QueueInner {
    jobs: Vec<Job>,
    batching_enabled: bool,
}

/// Top-level scheduler owning every submitted `Job` and the single
/// `GraphRuntime` that executes the one currently running.
pub struct JobQueue {
    inner: Mutex<QueueInner>,
    store: Arc<dyn QueueStorePort>,
    event_bus: Arc<dyn EventBusPort>,
    graph_runtime: Arc<GraphRuntime>,
    socket: Mutex<Option<mpsc::UnboundedSender<JobNotification>>>,
}

impl JobQueue {
    /// Build a queue, restoring persisted state. Jobs left `running` by a
    /// previous process (a crash or a forced restart) are rewritten to
    /// `error` with a fixed message; pending and finished jobs are kept
    /// as-is (§6 Failure recovery). `default_batching_enabled` is used
    /// only when no persisted `batching_enabled` exists yet (a fresh
    /// install), so it should be `Settings::effective_batching_enabled()`
    /// (`true` by default, §6) rather than a hardcoded value.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::PersistenceFailed` if the store exists but is
    /// unreadable or malformed.
    pub async fn new(
        store: Arc<dyn QueueStorePort>,
        event_bus: Arc<dyn EventBusPort>,
        graph_runtime: Arc<GraphRuntime>,
        default_batching_enabled: bool,
    ) -> Result<Arc<Self>, QueueError> {
        let persisted = store.load().await?;
        let (jobs, batching_enabled) = match persisted {
            Some(state) => {
                let mut jobs = state.jobs;
                for job in &mut jobs {
                    if job.status == JobStatus::Running {
                        job.mark_error(CRASH_RECOVERY_MESSAGE, Utc::now());
                    }
                }
                (jobs, state.batching_enabled)
            }
            None => (Vec::new(), default_batching_enabled),
        };

        let queue = Arc::new(Self {
            inner: Mutex::new(QueueInner { jobs, batching_enabled }),
            store,
            event_bus,
            graph_runtime,
            socket: Mutex::new(None),
        });
        queue.persist().await;
        Ok(queue)
    }

    /// Submit new jobs from workflow snapshots. Returns the new job ids
    /// in submission order.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` if any snapshot fails
    /// `WorkflowSnapshot::validate`, without enqueueing any of the batch.
    pub async fn enqueue(self: &Arc<Self>, snapshots: Vec<WorkflowSnapshot>) -> Result<Vec<String>, QueueError> {
        for snapshot in &snapshots {
            snapshot.validate()?;
        }

        let mut new_ids = Vec::with_capacity(snapshots.len());
        {
            let mut inner = self.inner.lock().await;
            for snapshot in snapshots {
                let id = new_job_id();
                inner.jobs.push(Job::new(id.clone(), snapshot, Utc::now()));
                new_ids.push(id);
            }
            if inner.batching_enabled {
                reorder_pending(&mut inner.jobs);
            }
        }

        self.persist().await;
        self.publish_queue_updated().await;
        self.process_next(Arc::clone(self)).await;
        Ok(new_ids)
    }

    /// Cancel a job. Pending jobs are simply dropped; the running job is
    /// aborted via the Graph Runtime (which in turn aborts both Model
    /// Server Managers); anything else is an invalid-state error.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::NotFound` / `QueueError::InvalidState` per
    /// §4.5's `cancel` contract.
    pub async fn cancel(self: &Arc<Self>, job_id: &str) -> Result<(), QueueError> {
        let action = {
            let mut inner = self.inner.lock().await;
            let Some(position) = inner.jobs.iter().position(|j| j.id == job_id) else {
                return Err(QueueError::NotFound(job_id.to_string()));
            };

            match inner.jobs[position].status {
                JobStatus::Pending => {
                    inner.jobs.remove(position);
                    CancelAction::Dropped
                }
                JobStatus::Running => {
                    inner.jobs[position].mark_cancelled(Utc::now());
                    CancelAction::AbortedRunning
                }
                _ => return Err(QueueError::InvalidState(job_id.to_string())),
            }
        };

        if matches!(action, CancelAction::AbortedRunning) {
            self.graph_runtime.cancel().await;
        }

        self.persist().await;
        self.publish_queue_updated().await;

        if matches!(action, CancelAction::AbortedRunning) {
            self.schedule_next_after_delay(Arc::clone(self));
        }
        Ok(())
    }

    /// Client view: the running job (if any), the first 10 pending jobs,
    /// and the last 20 finished jobs.
    pub async fn get_state(&self) -> QueueSnapshot {
        let inner = self.inner.lock().await;
        let running = inner.jobs.iter().find(|j| j.status == JobStatus::Running).cloned();
        let pending: Vec<Job> = inner
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .take(PENDING_PREVIEW)
            .cloned()
            .collect();
        let mut finished: Vec<Job> = inner.jobs.iter().filter(|j| j.is_terminal()).cloned().collect();
        if finished.len() > FINISHED_PREVIEW {
            finished = finished.split_off(finished.len() - FINISHED_PREVIEW);
        }
        let pending_count = inner.jobs.iter().filter(|j| j.status == JobStatus::Pending).count();
        let total_count = inner.jobs.len();

        QueueSnapshot {
            running,
            pending,
            finished,
            pending_count,
            total_count,
        }
    }

    /// Drop every still-pending job.
    pub async fn clear_pending(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.jobs.retain(|j| j.status != JobStatus::Pending);
        }
        self.persist().await;
        self.publish_queue_updated().await;
    }

    /// Register (or clear, with `None`) the client channel that receives
    /// direct completion notifications alongside the Event Bus publish.
    pub async fn set_socket(&self, sender: Option<mpsc::UnboundedSender<JobNotification>>) {
        *self.socket.lock().await = sender;
    }

    async fn process_next(self: &Arc<Self>, queue: Arc<Self>) {
        let next = {
            let inner = self.inner.lock().await;
            if inner.jobs.iter().any(|j| j.status == JobStatus::Running) {
                return;
            }
            inner.jobs.iter().position(|j| j.status == JobStatus::Pending)
        };
        let Some(position) = next else { return };

        let (job_id, snapshot) = {
            let mut inner = self.inner.lock().await;
            inner.jobs[position].mark_running(Utc::now());
            (inner.jobs[position].id.clone(), inner.jobs[position].snapshot.clone())
        };
        self.persist().await;
        self.publish_queue_updated().await;

        tokio::spawn(async move {
            let result = queue.graph_runtime.run_job(&job_id, &snapshot).await;
            queue.finish_job(&job_id, result).await;
        });
    }

    async fn finish_job(
        self: &Arc<Self>,
        job_id: &str,
        result: Result<std::collections::HashMap<String, NodeOutput>, leaxer_core::ports::GraphError>,
    ) {
        let notification = {
            let mut inner = self.inner.lock().await;
            let Some(job) = inner.jobs.iter_mut().find(|j| j.id == job_id) else {
                warn!(job_id, "finished job vanished from the queue");
                return;
            };
            // A cancel() racing this completion already marked the job
            // cancelled; don't overwrite that terminal status.
            if job.status != JobStatus::Running {
                None
            } else {
                match result {
                    Ok(outputs) => {
                        job.mark_completed(Utc::now());
                        Some(JobNotification::Completed {
                            job_id: job_id.to_string(),
                            outputs,
                        })
                    }
                    Err(e) => {
                        job.mark_error(e.to_string(), Utc::now());
                        Some(JobNotification::Error {
                            job_id: job_id.to_string(),
                            error: e.to_string(),
                        })
                    }
                }
            }
        };

        if let Some(notification) = notification {
            match &notification {
                JobNotification::Completed { job_id, .. } => {
                    self.event_bus.publish(AppEvent::JobCompleted { job_id: job_id.clone() });
                }
                JobNotification::Error { job_id, error } => {
                    self.event_bus.publish(AppEvent::JobError {
                        job_id: job_id.clone(),
                        error: error.clone(),
                    });
                }
            }
            if let Some(sender) = self.socket.lock().await.as_ref() {
                let _ = sender.send(notification);
            }
        }

        {
            let mut inner = self.inner.lock().await;
            if inner.batching_enabled {
                reorder_pending(&mut inner.jobs);
            }
        }
        self.persist().await;
        self.publish_queue_updated().await;
        debug!(job_id, "job finished, scheduling next");
    }

    fn schedule_next_after_delay(self: &Arc<Self>, queue: Arc<Self>) {
        tokio::spawn(async move {
            tokio::time::sleep(RESCHEDULE_DELAY).await;
            let inner_queue = Arc::clone(&queue);
            queue.process_next(inner_queue).await;
        });
    }

    async fn publish_queue_updated(&self) {
        let inner = self.inner.lock().await;
        let pending_count = inner.jobs.iter().filter(|j| j.status == JobStatus::Pending).count();
        let total_count = inner.jobs.len();
        drop(inner);
        self.event_bus.publish(AppEvent::QueueUpdated {
            pending_count,
            total_count,
        });
    }

    async fn persist(&self) {
        let state = {
            let inner = self.inner.lock().await;
            PersistedQueueState {
                jobs: inner.jobs.clone(),
                batching_enabled: inner.batching_enabled,
            }
        };
        if let Err(e) = self.store.save(&state).await {
            warn!(error = %e, "failed to persist queue state");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CancelAction {
    Dropped,
    AbortedRunning,
}
