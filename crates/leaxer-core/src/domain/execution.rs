//! Per-job execution state.
//!
//! `ExecutionContext` is owned exclusively by the Graph Runtime executing a
//! job; `ExecutionSnapshot` is the UI-safe, single-slot view published
//! through the Execution State Store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Materialized output of a single workflow node.
///
/// Left as opaque JSON: node output shapes are owned by the (out-of-scope)
/// per-node algorithms, not by the runtime.
pub type NodeOutput = serde_json::Value;

/// Mutable state the Graph Runtime threads through one job's execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub job_id: String,
    pub outputs: HashMap<String, NodeOutput>,
    pub current_node: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Number of not-yet-satisfied downstream edges per node id. When a
    /// count reaches zero its output is evicted from `outputs`.
    pub consumer_counts: HashMap<String, u32>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(job_id: String, consumer_counts: HashMap<String, u32>, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            outputs: HashMap::new(),
            current_node: None,
            started_at,
            consumer_counts,
        }
    }

    pub fn record_output(&mut self, node_id: String, output: NodeOutput) {
        self.outputs.insert(node_id, output);
    }

    /// Decrement the consumer count for `source_node_id`; evict its output
    /// once every consumer has read it.
    ///
    /// A source with no entry in `consumer_counts` (a node nobody reads
    /// downstream of) is left untouched.
    pub fn consume_input(&mut self, source_node_id: &str) {
        if let Some(count) = self.consumer_counts.get_mut(source_node_id) {
            if *count > 0 {
                *count -= 1;
            }
            if *count == 0 {
                self.outputs.remove(source_node_id);
            }
        }
    }
}

/// Progress of the node currently executing within a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepProgress {
    pub current: u32,
    pub total: u32,
    pub percentage: f32,
}

impl StepProgress {
    #[must_use]
    pub fn new(current: u32, total: u32) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            (f64::from(current) / f64::from(total) * 100.0) as f32
        };
        Self {
            current,
            total,
            percentage,
        }
    }
}

/// UI-safe snapshot of the currently executing job, held in the single
/// slot of the Execution State Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub is_executing: bool,
    pub node_ids: Vec<String>,
    pub current_node: Option<String>,
    pub current_index: usize,
    pub total_nodes: usize,
    pub step_progress: Option<StepProgress>,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_count_evicts_output_at_zero() {
        let mut counts = HashMap::new();
        counts.insert("a".to_string(), 2);
        let mut ctx = ExecutionContext::new("job1".to_string(), counts, Utc::now());
        ctx.record_output("a".to_string(), serde_json::json!({"v": 1}));

        ctx.consume_input("a");
        assert!(ctx.outputs.contains_key("a"));
        assert_eq!(ctx.consumer_counts["a"], 1);

        ctx.consume_input("a");
        assert!(!ctx.outputs.contains_key("a"));
        assert_eq!(ctx.consumer_counts["a"], 0);
    }

    #[test]
    fn consume_input_on_untracked_node_is_noop() {
        let mut ctx = ExecutionContext::new("job1".to_string(), HashMap::new(), Utc::now());
        ctx.record_output("a".to_string(), serde_json::json!(null));
        ctx.consume_input("a");
        assert!(ctx.outputs.contains_key("a"));
    }

    #[test]
    fn step_progress_computes_percentage() {
        let progress = StepProgress::new(10, 20);
        assert!((progress.percentage - 50.0).abs() < f32::EPSILON);
    }
}
