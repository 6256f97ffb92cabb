//! Model Server Manager port.
//!
//! One implementation per variant (image, text); the Job Queue and Graph
//! Runtime depend only on this trait, never on a concrete server type.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ServerError;
use crate::domain::{ServerStatus, StartupParams};

/// A generation request dispatched to a Model Server Manager.
///
/// `options` carries the request-specific fields (prompt, sampler
/// settings, etc.) as an opaque JSON object; the Manager splits out the
/// subset that forms `StartupParams` before deciding whether a restart is
/// required. `job_id`/`node_id` are carried through so the Manager can
/// annotate `generation.progress`/`llm.streaming` events without needing
/// to know which job is running (§4.5 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub job_id: String,
    pub node_id: String,
    pub model_path: PathBuf,
    pub startup_params: StartupParams,
    pub options: serde_json::Value,
}

/// Result of a completed generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub payload: serde_json::Value,
}

/// Port implemented by the image and text Model Server Managers.
#[async_trait]
pub trait ModelServerPort: Send + Sync {
    /// Current lifecycle status.
    async fn status(&self) -> ServerStatus;

    /// Run a generation request, starting or restarting the server first
    /// if required by `request.startup_params`/`request.model_path`.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, ServerError>;

    /// Abort whatever is in flight: kill the OS process, fail every
    /// pending and in-flight request, and reset to idle.
    async fn abort(&self);

    /// Stop the server if running, without failing pending work (used by
    /// the `unload_after` idle-timeout policy, §9 Open Questions).
    async fn stop(&self);

    /// Arm (or re-arm) an idle-unload timer: if no request is dispatched
    /// through this server within `after`, stop it. A later request
    /// naturally supersedes a pending timer since it resets the activity
    /// clock the timer checks against. No-op for workers with no
    /// persistent process to unload (e.g. the CLI one-shot worker).
    async fn schedule_idle_unload(&self, after: std::time::Duration) {
        let _ = after;
    }
}
