//! Job domain type and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::workflow::WorkflowSnapshot;

/// Lifecycle status of a `Job`.
///
/// Transitions: `pending -> running -> {completed, error}`, or
/// `pending -> cancelled` for an un-started cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
    Cancelled,
}

/// A submitted workflow instance with a lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub snapshot: WorkflowSnapshot,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Precomputed at enqueue time by scanning the snapshot for
    /// `LoadModel`/`GenerateImage` nodes. Used solely for batching
    /// re-order; `None` when the workflow names no model.
    pub cached_model_path: Option<String>,
}

impl Job {
    /// Construct a new pending job from a workflow snapshot.
    ///
    /// `cached_model_path` is computed here by scanning node data for a
    /// `model_path` field on nodes whose type names a model-consuming
    /// worker (`LoadModel`, `GenerateImage`, `GenerateText`).
    #[must_use]
    pub fn new(id: String, snapshot: WorkflowSnapshot, created_at: DateTime<Utc>) -> Self {
        let cached_model_path = Self::extract_model_path(&snapshot);
        Self {
            id,
            snapshot,
            status: JobStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            error: None,
            cached_model_path,
        }
    }

    fn extract_model_path(snapshot: &WorkflowSnapshot) -> Option<String> {
        const MODEL_NODE_TYPES: &[&str] = &["LoadModel", "GenerateImage", "GenerateText"];

        snapshot.nodes.values().find_map(|node| {
            if !MODEL_NODE_TYPES.contains(&node.node_type.as_str()) {
                return None;
            }
            node.data
                .get("model_path")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
    }

    pub fn mark_running(&mut self, at: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.started_at = Some(at);
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(at);
    }

    pub fn mark_error(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.status = JobStatus::Error;
        self.error = Some(message.into());
        self.completed_at = Some(at);
    }

    pub fn mark_cancelled(&mut self, at: DateTime<Utc>) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(at);
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use indexmap::IndexMap;

    use super::*;
    use crate::domain::workflow::{ComputeBackend, ModelCachingStrategy, NodeSpec};

    fn snapshot_with_model(path: &str) -> WorkflowSnapshot {
        let mut nodes = IndexMap::new();
        nodes.insert(
            "load".to_string(),
            NodeSpec {
                node_type: "LoadModel".to_string(),
                data: serde_json::json!({ "model_path": path }),
                inputs: HashMap::new(),
            },
        );
        WorkflowSnapshot {
            nodes,
            edges: Vec::new(),
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::Auto,
        }
    }

    #[test]
    fn extracts_cached_model_path() {
        let job = Job::new(
            "abc123".to_string(),
            snapshot_with_model("B.safetensors"),
            Utc::now(),
        );
        assert_eq!(job.cached_model_path.as_deref(), Some("B.safetensors"));
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn status_transitions_set_timestamps() {
        let mut job = Job::new(
            "abc123".to_string(),
            snapshot_with_model("A.safetensors"),
            Utc::now(),
        );
        let started = Utc::now();
        job.mark_running(started);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.started_at, Some(started));

        let completed = Utc::now();
        job.mark_completed(completed);
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.is_terminal());
    }
}
