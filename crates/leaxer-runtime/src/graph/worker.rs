//! Node dispatch: routes a workflow node to the worker that can execute
//! it (§4.5 step 3). Per-node algorithms are out of scope; this only
//! decides *which* worker a node type belongs to.

use std::collections::HashMap;
use std::sync::Arc;

use leaxer_core::domain::NodeOutput;
use leaxer_core::ports::{GenerationRequest, GraphError, ModelServerPort, ServerError, TransformNode};

/// The node-type names the runtime recognizes as model-consuming work,
/// routed to a persistent (or one-shot-fallback) Model Server Manager.
pub const IMAGE_NODE_TYPE: &str = "GenerateImage";
pub const TEXT_NODE_TYPE: &str = "GenerateText";
pub const VIDEO_NODE_TYPE: &str = "GenerateVideo";

/// The full set of workers a Graph Runtime can dispatch to: the two
/// persistent Model Server Managers, the CLI one-shot path for modes the
/// server doesn't support (video, §4.3), and any registered in-process
/// transform nodes (§4.5 ADDED).
pub struct Workers {
    pub image_server: Arc<dyn ModelServerPort>,
    pub text_server: Arc<dyn ModelServerPort>,
    pub video_worker: Arc<dyn ModelServerPort>,
    pub transforms: HashMap<String, Arc<dyn TransformNode>>,
}

impl Workers {
    #[must_use]
    pub fn new(
        image_server: Arc<dyn ModelServerPort>,
        text_server: Arc<dyn ModelServerPort>,
        video_worker: Arc<dyn ModelServerPort>,
    ) -> Self {
        Self {
            image_server,
            text_server,
            video_worker,
            transforms: HashMap::new(),
        }
    }

    /// Register a pure in-process transform node under its node type name.
    pub fn register_transform(&mut self, node: Arc<dyn TransformNode>) {
        self.transforms.insert(node.node_type().to_string(), node);
    }

    /// Execute one node: build and dispatch a `GenerationRequest` for a
    /// model-consuming node type, or run the matching in-process
    /// transform. Returns `GraphError::NodeError` for any node type with
    /// no registered worker.
    pub async fn dispatch(
        &self,
        job_id: &str,
        node_id: &str,
        node_type: &str,
        options: serde_json::Value,
        model_path: std::path::PathBuf,
        startup_params: leaxer_core::domain::StartupParams,
        inputs: &HashMap<String, NodeOutput>,
    ) -> Result<NodeOutput, GraphError> {
        match node_type {
            IMAGE_NODE_TYPE => {
                self.dispatch_to_server(&self.image_server, job_id, node_id, options, model_path, startup_params)
                    .await
            }
            TEXT_NODE_TYPE => {
                self.dispatch_to_server(&self.text_server, job_id, node_id, options, model_path, startup_params)
                    .await
            }
            VIDEO_NODE_TYPE => {
                self.dispatch_to_server(&self.video_worker, job_id, node_id, options, model_path, startup_params)
                    .await
            }
            other => {
                let transform = self.transforms.get(other).ok_or_else(|| {
                    GraphError::NodeError(node_id.to_string(), format!("no worker registered for node type {other}"))
                })?;
                transform
                    .run(inputs, &options)
                    .await
                    .map_err(|e| GraphError::NodeError(node_id.to_string(), e.to_string()))
            }
        }
    }

    async fn dispatch_to_server(
        &self,
        server: &Arc<dyn ModelServerPort>,
        job_id: &str,
        node_id: &str,
        options: serde_json::Value,
        model_path: std::path::PathBuf,
        startup_params: leaxer_core::domain::StartupParams,
    ) -> Result<NodeOutput, GraphError> {
        let request = GenerationRequest {
            job_id: job_id.to_string(),
            node_id: node_id.to_string(),
            model_path,
            startup_params,
            options,
        };
        match server.generate(request).await {
            Ok(result) => Ok(result.payload),
            Err(ServerError::NotAvailable) => Err(GraphError::NodeError(
                node_id.to_string(),
                "no compatible server binary available".to_string(),
            )),
            Err(e) => Err(GraphError::Server(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use leaxer_core::domain::{ServerStatus, StartupParams};

    use super::*;

    struct EchoServer;

    #[async_trait]
    impl ModelServerPort for EchoServer {
        async fn status(&self) -> ServerStatus {
            ServerStatus::Ready
        }
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<leaxer_core::ports::GenerationResult, ServerError> {
            Ok(leaxer_core::ports::GenerationResult {
                payload: request.options,
            })
        }
        async fn abort(&self) {}
        async fn stop(&self) {}
    }

    struct UpperCaseTransform;

    #[async_trait]
    impl TransformNode for UpperCaseTransform {
        fn node_type(&self) -> &str {
            "UpperCase"
        }
        async fn run(
            &self,
            _inputs: &HashMap<String, NodeOutput>,
            data: &serde_json::Value,
        ) -> Result<NodeOutput, GraphError> {
            let text = data.get("text").and_then(serde_json::Value::as_str).unwrap_or_default();
            Ok(serde_json::json!({ "text": text.to_uppercase() }))
        }
    }

    fn workers() -> Workers {
        Workers::new(Arc::new(EchoServer), Arc::new(EchoServer), Arc::new(EchoServer))
    }

    #[tokio::test]
    async fn dispatches_image_nodes_to_the_image_server() {
        let workers = workers();
        let output = workers
            .dispatch(
                "job1",
                "node1",
                IMAGE_NODE_TYPE,
                serde_json::json!({"prompt": "a cat"}),
                std::path::PathBuf::from("m.safetensors"),
                StartupParams::default(),
                &HashMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(output["prompt"], "a cat");
    }

    #[tokio::test]
    async fn unregistered_node_type_fails() {
        let workers = workers();
        let result = workers
            .dispatch(
                "job1",
                "node1",
                "SomeUnknownNode",
                serde_json::json!({}),
                std::path::PathBuf::new(),
                StartupParams::default(),
                &HashMap::new(),
            )
            .await;
        assert!(matches!(result, Err(GraphError::NodeError(_, _))));
    }

    #[tokio::test]
    async fn runs_registered_transform_node() {
        let mut workers = workers();
        workers.register_transform(Arc::new(UpperCaseTransform));
        let output = workers
            .dispatch(
                "job1",
                "node1",
                "UpperCase",
                serde_json::json!({"text": "hi"}),
                std::path::PathBuf::new(),
                StartupParams::default(),
                &HashMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(output["text"], "HI");
    }
}
