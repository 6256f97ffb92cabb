//! Job Queue (§4.5): persistence, batching re-order, and the top-level
//! scheduler that ties them to a `GraphRuntime`.

mod batching;
mod job_queue;
mod store;

pub use batching::reorder_pending;
pub use job_queue::{JobNotification, JobQueue, QueueSnapshot};
pub use store::JsonQueueStore;

/// Shared test fixtures for the `queue` module's unit tests, kept
/// separate from any single file since both `store` and `batching`
/// exercise the same minimal `Job` shape.
#[cfg(test)]
pub(crate) mod tests_support {
    use std::collections::HashMap;

    use chrono::Utc;
    use indexmap::IndexMap;
    use leaxer_core::domain::{ComputeBackend, Job, JobStatus, ModelCachingStrategy, NodeSpec, WorkflowSnapshot};

    /// Build a minimal pending job with the given id/status/cached model
    /// path, bypassing `cached_model_path` extraction so tests can set it
    /// directly without constructing matching node data.
    pub(crate) fn job_with(id: &str, status: JobStatus, cached_model_path: Option<&str>) -> Job {
        let mut nodes = IndexMap::new();
        nodes.insert(
            "noop".to_string(),
            NodeSpec {
                node_type: "Noop".to_string(),
                data: serde_json::json!({}),
                inputs: HashMap::new(),
            },
        );
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: Vec::new(),
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::Auto,
        };

        let mut job = Job::new(id.to_string(), snapshot, Utc::now());
        job.status = status;
        job.cached_model_path = cached_model_path.map(str::to_string);
        job
    }
}
