//! Model Server Manager state machine types.
//!
//! One `ServerState` exists per managed server (image, text). Shared by
//! both variants; the fields a given variant leaves unset are simply
//! `None`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::workflow::ComputeBackend;

/// Lifecycle state of a Model Server Manager.
///
/// `idle -> starting -> ready -> {stopping -> idle, crashed -> idle}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Idle,
    Starting,
    Ready,
    Stopping,
    Crashed,
}

/// Options that require a process restart when changed.
///
/// Equality between two `StartupParams` values is exactly the restart
/// decision in §4.3: if the newly requested params differ from the
/// currently running server's params, the server must be stopped and
/// respawned before the request can be dispatched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupParams {
    pub vae_path: Option<PathBuf>,
    pub tiling: bool,
    pub clip_l_path: Option<PathBuf>,
    pub clip_g_path: Option<PathBuf>,
    pub t5_path: Option<PathBuf>,
    pub controlnet_path: Option<PathBuf>,
    pub photomaker_dir: Option<PathBuf>,
    pub taesd_path: Option<PathBuf>,
    pub cpu_offload_vae: bool,
    pub cpu_offload_clip: bool,
    /// Text-server-only: context window size.
    pub n_ctx: Option<u32>,
    /// Text-server-only: number of GPU layers to offload.
    pub n_gpu_layers: Option<i32>,
    /// Text-server-only: use the model's embedded chat template.
    pub chat_template_jinja: bool,
}

/// A request waiting on the server to finish starting.
#[derive(Debug)]
pub struct PendingRequest<R> {
    pub request: R,
    pub enqueued_at: DateTime<Utc>,
}

/// State owned exclusively by one Model Server Manager.
#[derive(Debug)]
pub struct ServerState<R> {
    pub status: ServerStatus,
    pub os_pid: Option<u32>,
    pub current_model: Option<PathBuf>,
    pub compute_backend: Option<ComputeBackend>,
    pub listen_port: u16,
    pub startup_params: StartupParams,
    pub pending_requests: Vec<PendingRequest<R>>,
    pub start_time: Option<DateTime<Utc>>,
}

impl<R> ServerState<R> {
    #[must_use]
    pub fn idle(listen_port: u16) -> Self {
        Self {
            status: ServerStatus::Idle,
            os_pid: None,
            current_model: None,
            compute_backend: None,
            listen_port,
            startup_params: StartupParams::default(),
            pending_requests: Vec::new(),
            start_time: None,
        }
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.status, ServerStatus::Ready)
    }

    /// Whether a request for `model`/`params` can dispatch immediately
    /// against the currently running server, without a restart.
    #[must_use]
    pub fn matches(&self, model: &PathBuf, params: &StartupParams) -> bool {
        self.is_ready()
            && self.current_model.as_ref() == Some(model)
            && &self.startup_params == params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_state_does_not_match_anything() {
        let state: ServerState<()> = ServerState::idle(1234);
        assert!(!state.matches(&PathBuf::from("m.safetensors"), &StartupParams::default()));
    }

    #[test]
    fn matches_requires_equal_startup_params() {
        let mut state: ServerState<()> = ServerState::idle(1234);
        state.status = ServerStatus::Ready;
        state.current_model = Some(PathBuf::from("m.safetensors"));
        state.startup_params = StartupParams {
            tiling: true,
            ..Default::default()
        };

        assert!(!state.matches(&PathBuf::from("m.safetensors"), &StartupParams::default()));
        assert!(state.matches(
            &PathBuf::from("m.safetensors"),
            &StartupParams {
                tiling: true,
                ..Default::default()
            }
        ));
    }
}
