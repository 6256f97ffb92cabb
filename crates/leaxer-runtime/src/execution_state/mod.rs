//! Execution State Store (§4.7): a single-slot, UI-safe view of whichever
//! job the Graph Runtime is currently executing.
//!
//! There is at most one job running at a time (§4.5), so this is
//! deliberately not a map keyed by `job_id`: every mutator is a no-op when
//! no execution has been started, and `start_execution` replaces whatever
//! snapshot (if any) was left behind by the previous job.

use chrono::Utc;
use leaxer_core::domain::{ExecutionSnapshot, StepProgress};
use tokio::sync::RwLock;

/// Holds the single currently-executing job's UI-facing snapshot.
pub struct ExecutionStateStore {
    slot: RwLock<Option<ExecutionSnapshot>>,
}

impl ExecutionStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Begin tracking a new job's execution, discarding any leftover
    /// snapshot from a previous run.
    pub async fn start_execution(&self, node_ids: Vec<String>) {
        let total_nodes = node_ids.len();
        let mut slot = self.slot.write().await;
        *slot = Some(ExecutionSnapshot {
            is_executing: true,
            node_ids,
            current_node: None,
            current_index: 0,
            total_nodes,
            step_progress: None,
            started_at: Utc::now(),
        });
    }

    /// Advance to a new current node. A no-op if no execution was started.
    pub async fn set_current_node(&self, node_id: String, index: usize) {
        let mut slot = self.slot.write().await;
        if let Some(snapshot) = slot.as_mut() {
            snapshot.current_node = Some(node_id);
            snapshot.current_index = index;
            snapshot.step_progress = None;
        }
    }

    /// Record progress within the current node. A no-op if no execution
    /// was started.
    pub async fn set_step_progress(&self, current: u32, total: u32) {
        let mut slot = self.slot.write().await;
        if let Some(snapshot) = slot.as_mut() {
            snapshot.step_progress = Some(StepProgress::new(current, total));
        }
    }

    /// Clear the slot: the job has finished, failed, or been cancelled.
    pub async fn complete_execution(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }

    /// Current snapshot, if any job is executing.
    pub async fn get_state(&self) -> Option<ExecutionSnapshot> {
        self.slot.read().await.clone()
    }

    /// Whether a job is currently executing.
    pub async fn available(&self) -> bool {
        self.slot.read().await.is_some()
    }
}

impl Default for ExecutionStateStore {
    fn default() -> Self {
        Self::new()
    }
}
