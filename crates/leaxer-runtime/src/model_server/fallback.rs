//! Composes a persistent Model Server Manager with its CLI one-shot
//! counterpart (§4.3 "the Manager MUST delegate to a CLI-based one-shot
//! worker" when the server binary is absent for every backend; §7
//! `NotAvailable` "the server manager downgrades to CLI one-shot
//! transparently"). Callers see one `ModelServerPort`; which path
//! actually ran is invisible to them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leaxer_core::domain::ServerStatus;
use leaxer_core::ports::{GenerationRequest, GenerationResult, ModelServerPort, ServerError};

/// Tries the persistent server first; only on `ServerError::NotAvailable`
/// (no binary for any backend) does a request re-route to the one-shot
/// worker. Any other error from the server (spawn failure, timeout,
/// crash, abort, HTTP failure) is surfaced as-is, since those describe a
/// binary that does exist but failed, not one that's missing.
pub struct ServerWithFallback {
    server: Arc<dyn ModelServerPort>,
    one_shot: Arc<dyn ModelServerPort>,
}

impl ServerWithFallback {
    #[must_use]
    pub fn new(server: Arc<dyn ModelServerPort>, one_shot: Arc<dyn ModelServerPort>) -> Self {
        Self { server, one_shot }
    }
}

#[async_trait]
impl ModelServerPort for ServerWithFallback {
    /// The one-shot path has no persistent state of its own; status
    /// reflects the persistent server.
    async fn status(&self) -> ServerStatus {
        self.server.status().await
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, ServerError> {
        match self.server.generate(request.clone()).await {
            Err(ServerError::NotAvailable) => self.one_shot.generate(request).await,
            other => other,
        }
    }

    /// Both paths may have something in flight; abort whichever does.
    async fn abort(&self) {
        self.server.abort().await;
        self.one_shot.abort().await;
    }

    async fn stop(&self) {
        self.server.stop().await;
    }

    async fn schedule_idle_unload(&self, after: Duration) {
        self.server.schedule_idle_unload(after).await;
    }
}

#[cfg(test)]
mod tests {
    use leaxer_core::domain::StartupParams;

    use super::*;

    struct AlwaysNotAvailable;
    #[async_trait]
    impl ModelServerPort for AlwaysNotAvailable {
        async fn status(&self) -> ServerStatus {
            ServerStatus::Idle
        }
        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResult, ServerError> {
            Err(ServerError::NotAvailable)
        }
        async fn abort(&self) {}
        async fn stop(&self) {}
    }

    struct AlwaysCrashes;
    #[async_trait]
    impl ModelServerPort for AlwaysCrashes {
        async fn status(&self) -> ServerStatus {
            ServerStatus::Idle
        }
        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResult, ServerError> {
            Err(ServerError::ServerCrashed(Some(1)))
        }
        async fn abort(&self) {}
        async fn stop(&self) {}
    }

    struct Echo;
    #[async_trait]
    impl ModelServerPort for Echo {
        async fn status(&self) -> ServerStatus {
            ServerStatus::Ready
        }
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, ServerError> {
            Ok(GenerationResult { payload: request.options })
        }
        async fn abort(&self) {}
        async fn stop(&self) {}
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            job_id: "job1".to_string(),
            node_id: "node1".to_string(),
            model_path: "model.safetensors".into(),
            startup_params: StartupParams::default(),
            options: serde_json::json!({"prompt": "a cat"}),
        }
    }

    #[tokio::test]
    async fn not_available_falls_back_to_one_shot() {
        let wrapper = ServerWithFallback::new(Arc::new(AlwaysNotAvailable), Arc::new(Echo));
        let result = wrapper.generate(request()).await.unwrap();
        assert_eq!(result.payload["prompt"], "a cat");
    }

    #[tokio::test]
    async fn other_server_errors_are_not_masked_by_the_fallback() {
        let wrapper = ServerWithFallback::new(Arc::new(AlwaysCrashes), Arc::new(Echo));
        let result = wrapper.generate(request()).await;
        assert!(matches!(result, Err(ServerError::ServerCrashed(Some(1)))));
    }

    #[tokio::test]
    async fn a_present_server_never_reaches_the_one_shot_path() {
        let wrapper = ServerWithFallback::new(Arc::new(Echo), Arc::new(AlwaysNotAvailable));
        let result = wrapper.generate(request()).await.unwrap();
        assert_eq!(result.payload["prompt"], "a cat");
    }
}
