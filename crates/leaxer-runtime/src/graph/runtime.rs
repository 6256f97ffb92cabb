//! Graph Runtime (§4.5 steps 1-4): executes one job's `WorkflowSnapshot`
//! layer by layer, forwarding progress to the Event Bus and freeing node
//! outputs as soon as every downstream consumer has read them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leaxer_core::domain::{ComputeBackend, ExecutionContext, ModelCachingStrategy, NodeOutput, StartupParams, WorkflowSnapshot};
use leaxer_core::events::AppEvent;
use leaxer_core::ports::{EventBusPort, GraphError};
use tokio_util::sync::CancellationToken;

use super::layering::topological_layers;
use super::worker::{IMAGE_NODE_TYPE, TEXT_NODE_TYPE, Workers};
use crate::execution_state::ExecutionStateStore;

/// Default idle window before an `unload_after`-cached job's servers are
/// stopped, per §9 Open Question 3 (no formal spec value given).
pub const DEFAULT_UNLOAD_IDLE_AFTER: Duration = Duration::from_secs(300);

/// Walks one job's DAG to completion or first node failure.
pub struct GraphRuntime {
    workers: Arc<Workers>,
    event_bus: Arc<dyn EventBusPort>,
    execution_state: Arc<ExecutionStateStore>,
    cancel: tokio::sync::Mutex<Option<CancellationToken>>,
    unload_idle_after: Duration,
}

impl GraphRuntime {
    #[must_use]
    pub fn new(
        workers: Arc<Workers>,
        event_bus: Arc<dyn EventBusPort>,
        execution_state: Arc<ExecutionStateStore>,
    ) -> Self {
        Self::with_unload_idle_after(workers, event_bus, execution_state, DEFAULT_UNLOAD_IDLE_AFTER)
    }

    /// Same as `new`, with an explicit idle window for the
    /// `unload_after` caching strategy instead of the default 300s.
    #[must_use]
    pub fn with_unload_idle_after(
        workers: Arc<Workers>,
        event_bus: Arc<dyn EventBusPort>,
        execution_state: Arc<ExecutionStateStore>,
        unload_idle_after: Duration,
    ) -> Self {
        Self {
            workers,
            event_bus,
            execution_state,
            cancel: tokio::sync::Mutex::new(None),
            unload_idle_after,
        }
    }

    /// Run `snapshot` to completion, publishing `generation.progress`,
    /// `generation.complete`/`generation.error` per node as it finishes,
    /// and updating the Execution State Store throughout.
    ///
    /// # Errors
    ///
    /// Returns the first node's `GraphError` and does not execute any
    /// node downstream of the failure (§4.5 step 4).
    pub async fn run_job(
        &self,
        job_id: &str,
        snapshot: &WorkflowSnapshot,
    ) -> Result<HashMap<String, NodeOutput>, GraphError> {
        snapshot.validate()?;

        let layers = topological_layers(snapshot);
        let node_ids: Vec<String> = layers.iter().flatten().cloned().collect();
        self.execution_state.start_execution(node_ids).await;

        let cancel = CancellationToken::new();
        *self.cancel.lock().await = Some(cancel.clone());

        let consumer_counts = consumer_counts(snapshot);
        let mut ctx = ExecutionContext::new(job_id.to_string(), consumer_counts, Utc::now());

        let mut index = 0usize;
        for layer in &layers {
            for node_id in layer {
                if cancel.is_cancelled() {
                    self.execution_state.complete_execution().await;
                    return Err(GraphError::NodeError(node_id.clone(), "aborted by user".to_string()));
                }

                self.execution_state.set_current_node(node_id.clone(), index).await;
                ctx.current_node = Some(node_id.clone());
                index += 1;

                let node = snapshot
                    .nodes
                    .get(node_id)
                    .expect("node ids come from this snapshot's own layering");

                let inputs = gather_inputs(snapshot, node_id, &mut ctx);
                let model_path = node
                    .data
                    .get("model_path")
                    .and_then(serde_json::Value::as_str)
                    .map(std::path::PathBuf::from)
                    .unwrap_or_default();
                let startup_params = extract_startup_params(&node.data);

                let result = self
                    .workers
                    .dispatch(
                        job_id,
                        node_id,
                        &node.node_type,
                        node.data.clone(),
                        model_path,
                        startup_params,
                        &inputs,
                    )
                    .await;

                match result {
                    Ok(output) => {
                        self.event_bus.publish(AppEvent::GenerationComplete {
                            job_id: job_id.to_string(),
                            node_id: node_id.clone(),
                        });
                        ctx.record_output(node_id.clone(), output);
                    }
                    Err(e) => {
                        self.event_bus.publish(AppEvent::GenerationError {
                            job_id: job_id.to_string(),
                            node_id: node_id.clone(),
                            error: e.to_string(),
                        });
                        self.execution_state.complete_execution().await;
                        *self.cancel.lock().await = None;
                        return Err(e);
                    }
                }
            }
        }

        self.execution_state.complete_execution().await;
        *self.cancel.lock().await = None;
        self.maybe_schedule_unload(snapshot).await;
        Ok(ctx.outputs)
    }

    /// `unload_after` (§3 `model_caching_strategy`) arms an idle-unload
    /// timer on every persistent server this snapshot actually used;
    /// `keep_resident`/`auto` leave servers running, matching the
    /// existing restart-on-demand behavior.
    async fn maybe_schedule_unload(&self, snapshot: &WorkflowSnapshot) {
        if snapshot.model_caching_strategy != ModelCachingStrategy::UnloadAfter {
            return;
        }
        let types: std::collections::HashSet<&str> =
            snapshot.nodes.values().map(|n| n.node_type.as_str()).collect();
        if types.contains(IMAGE_NODE_TYPE) {
            self.workers.image_server.schedule_idle_unload(self.unload_idle_after).await;
        }
        if types.contains(TEXT_NODE_TYPE) {
            self.workers.text_server.schedule_idle_unload(self.unload_idle_after).await;
        }
    }

    /// Abort the currently running job, if any: cancels the execution
    /// loop and kills whatever the two persistent servers are doing.
    pub async fn cancel(&self) {
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }
        self.workers.image_server.abort().await;
        self.workers.text_server.abort().await;
        self.workers.video_worker.abort().await;
    }
}

/// Precompute, per node, how many downstream edges still need to read
/// its output (§4.5 step 2).
fn consumer_counts(snapshot: &WorkflowSnapshot) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for edge in &snapshot.edges {
        *counts.entry(edge.source_node_id.clone()).or_insert(0) += 1;
    }
    counts
}

/// Resolve every incoming edge for `node_id` against already-recorded
/// outputs, decrementing the source's consumer count as each is read.
fn gather_inputs(snapshot: &WorkflowSnapshot, node_id: &str, ctx: &mut ExecutionContext) -> HashMap<String, NodeOutput> {
    let mut inputs = HashMap::new();
    for edge in &snapshot.edges {
        if edge.target_node_id != node_id {
            continue;
        }
        if let Some(output) = ctx.outputs.get(&edge.source_node_id).cloned() {
            inputs.insert(edge.target_port.clone(), output);
        }
        ctx.consume_input(&edge.source_node_id);
    }
    inputs
}

/// Pull the restart-triggering subset of a node's `data` into
/// `StartupParams`. Unknown/absent fields default; compute backend lives
/// on the snapshot, not per-node, so it isn't threaded through here.
fn extract_startup_params(data: &serde_json::Value) -> StartupParams {
    fn path(data: &serde_json::Value, key: &str) -> Option<std::path::PathBuf> {
        data.get(key).and_then(serde_json::Value::as_str).map(std::path::PathBuf::from)
    }
    fn flag(data: &serde_json::Value, key: &str) -> bool {
        data.get(key).and_then(serde_json::Value::as_bool).unwrap_or(false)
    }

    StartupParams {
        vae_path: path(data, "vae_path"),
        tiling: flag(data, "tiling"),
        clip_l_path: path(data, "clip_l_path"),
        clip_g_path: path(data, "clip_g_path"),
        t5_path: path(data, "t5_path"),
        controlnet_path: path(data, "controlnet_path"),
        photomaker_dir: path(data, "photomaker_dir"),
        taesd_path: path(data, "taesd_path"),
        cpu_offload_vae: flag(data, "cpu_offload_vae"),
        cpu_offload_clip: flag(data, "cpu_offload_clip"),
        n_ctx: data.get("n_ctx").and_then(serde_json::Value::as_u64).map(|v| v as u32),
        n_gpu_layers: data.get("n_gpu_layers").and_then(serde_json::Value::as_i64).map(|v| v as i32),
        chat_template_jinja: flag(data, "chat_template_jinja"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;

    use async_trait::async_trait;
    use indexmap::IndexMap;
    use leaxer_core::domain::{Edge, ModelCachingStrategy, NodeSpec, ServerStatus};
    use leaxer_core::events::Topic;
    use leaxer_core::ports::{GenerationRequest, GenerationResult, ModelServerPort, ServerError};
    use tokio_stream::wrappers::BroadcastStream;

    use super::*;

    struct EchoServer;

    #[async_trait]
    impl ModelServerPort for EchoServer {
        async fn status(&self) -> ServerStatus {
            ServerStatus::Ready
        }
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, ServerError> {
            Ok(GenerationResult { payload: request.options })
        }
        async fn abort(&self) {}
        async fn stop(&self) {}
    }

    struct TrackingServer {
        idle_unload_calls: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl ModelServerPort for TrackingServer {
        async fn status(&self) -> ServerStatus {
            ServerStatus::Ready
        }
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, ServerError> {
            Ok(GenerationResult { payload: request.options })
        }
        async fn abort(&self) {}
        async fn stop(&self) {}
        async fn schedule_idle_unload(&self, _after: Duration) {
            self.idle_unload_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    struct FailingServer;

    #[async_trait]
    impl ModelServerPort for FailingServer {
        async fn status(&self) -> ServerStatus {
            ServerStatus::Idle
        }
        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResult, ServerError> {
            Err(ServerError::NotAvailable)
        }
        async fn abort(&self) {}
        async fn stop(&self) {}
    }

    struct NoopBus;
    #[async_trait]
    impl EventBusPort for NoopBus {
        fn publish(&self, _event: AppEvent) -> usize {
            0
        }
        fn subscribe(&self, _topic: Topic) -> BroadcastStream<AppEvent> {
            let (tx, _rx) = tokio::sync::broadcast::channel(1);
            BroadcastStream::new(tx.subscribe())
        }
        fn recent_logs(&self, _count: usize) -> Vec<String> {
            Vec::new()
        }
    }

    fn node(node_type: &str, data: serde_json::Value) -> NodeSpec {
        NodeSpec {
            node_type: node_type.to_string(),
            data,
            inputs: StdHashMap::new(),
        }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            source_node_id: from.to_string(),
            source_port: "out".to_string(),
            target_node_id: to.to_string(),
            target_port: "in".to_string(),
        }
    }

    #[tokio::test]
    async fn runs_a_simple_chain_to_completion() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node("GenerateImage", serde_json::json!({"prompt": "cat"})));
        nodes.insert("b".to_string(), node("GenerateText", serde_json::json!({"prompt": "describe"})));
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: vec![edge("a", "b")],
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: leaxer_core::domain::ModelCachingStrategy::Auto,
        };

        let workers = Arc::new(Workers::new(Arc::new(EchoServer), Arc::new(EchoServer), Arc::new(EchoServer)));
        let runtime = GraphRuntime::new(workers, Arc::new(NoopBus), Arc::new(ExecutionStateStore::new()));

        let outputs = runtime.run_job("job1", &snapshot).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs.contains_key("b"));
    }

    #[tokio::test]
    async fn node_failure_stops_before_downstream_nodes() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node("GenerateImage", serde_json::json!({})));
        nodes.insert("b".to_string(), node("GenerateText", serde_json::json!({})));
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: vec![edge("a", "b")],
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::Auto,
        };

        let workers = Arc::new(Workers::new(Arc::new(FailingServer), Arc::new(EchoServer), Arc::new(EchoServer)));
        let runtime = GraphRuntime::new(workers, Arc::new(NoopBus), Arc::new(ExecutionStateStore::new()));

        let result = runtime.run_job("job1", &snapshot).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unload_after_arms_the_servers_the_job_actually_used() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node("GenerateImage", serde_json::json!({"prompt": "cat"})));
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: Vec::new(),
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::UnloadAfter,
        };

        let image_calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let text_calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let workers = Arc::new(Workers::new(
            Arc::new(TrackingServer { idle_unload_calls: Arc::clone(&image_calls) }),
            Arc::new(TrackingServer { idle_unload_calls: Arc::clone(&text_calls) }),
            Arc::new(EchoServer),
        ));
        let runtime = GraphRuntime::new(workers, Arc::new(NoopBus), Arc::new(ExecutionStateStore::new()));

        runtime.run_job("job1", &snapshot).await.unwrap();

        assert_eq!(image_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(text_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keep_resident_never_arms_idle_unload() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node("GenerateImage", serde_json::json!({"prompt": "cat"})));
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: Vec::new(),
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::KeepResident,
        };

        let image_calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let workers = Arc::new(Workers::new(
            Arc::new(TrackingServer { idle_unload_calls: Arc::clone(&image_calls) }),
            Arc::new(EchoServer),
            Arc::new(EchoServer),
        ));
        let runtime = GraphRuntime::new(workers, Arc::new(NoopBus), Arc::new(ExecutionStateStore::new()));

        runtime.run_job("job1", &snapshot).await.unwrap();

        assert_eq!(image_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
