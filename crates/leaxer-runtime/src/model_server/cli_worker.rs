//! CLI One-Shot Worker (§4.4): a stateless executor that spawns a fresh
//! external binary per request instead of keeping a persistent server
//! around. Used when no server binary exists for any backend, when the
//! request mode isn't server-supported (video), or when a workflow
//! explicitly asks for one-shot mode.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use leaxer_core::domain::ServerStatus;
use leaxer_core::ports::{GenerationRequest, GenerationResult, ModelServerPort, ProcessTrackerPort, ServerError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::launcher::{LaunchSpec, spawn, spawn_log_readers};
use crate::shutdown::kill_pid;

/// Builds the CLI invocation for a one-shot request: the binary path and
/// argument list. Implemented per call-site (image/text/video) since the
/// CLI surface differs from the server's HTTP API.
pub trait OneShotCommand: Send + Sync + 'static {
    fn label(&self) -> &'static str;
    fn binary_path(&self, bin_dir: &Path) -> Option<PathBuf>;
    fn build_args(&self, request: &GenerationRequest, bin_dir: &Path) -> Vec<String>;
    /// Parse the worker's stdout tail and exit status into a result
    /// payload (an output file path or base64 blob, depending on mode).
    fn parse_output(&self, stdout_tail: &[String], exit_code: Option<i32>) -> Result<serde_json::Value, ServerError>;
}

/// A stateless per-request spawner, sharing the Process Tracker with the
/// persistent Model Server Managers so an abort can reach it the same way.
pub struct CliOneShotWorker<C: OneShotCommand> {
    command: Arc<C>,
    bin_dir: PathBuf,
    process_tracker: Arc<dyn ProcessTrackerPort>,
    active_pid: std::sync::Mutex<Option<u32>>,
    active_cancel: std::sync::Mutex<Option<CancellationToken>>,
}

impl<C: OneShotCommand> CliOneShotWorker<C> {
    #[must_use]
    pub fn new(command: C, bin_dir: PathBuf, process_tracker: Arc<dyn ProcessTrackerPort>) -> Self {
        Self {
            command: Arc::new(command),
            bin_dir,
            process_tracker,
            active_pid: std::sync::Mutex::new(None),
            active_cancel: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl<C: OneShotCommand> ModelServerPort for CliOneShotWorker<C> {
    /// The one-shot worker has no persistent state machine: it is idle
    /// whenever no request is in flight.
    async fn status(&self) -> ServerStatus {
        if self.active_pid.lock().expect("active_pid lock poisoned").is_some() {
            ServerStatus::Ready
        } else {
            ServerStatus::Idle
        }
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, ServerError> {
        let Some(exe_path) = self.command.binary_path(&self.bin_dir) else {
            return Err(ServerError::NotAvailable);
        };
        let args = self.command.build_args(&request, &self.bin_dir);
        let spec = LaunchSpec {
            exe_path,
            args,
            bin_dir: self.bin_dir.clone(),
            extra_env: Vec::new(),
        };

        let mut launched = spawn(&spec).map_err(|e| ServerError::SpawnFailed(e.to_string()))?;
        let os_pid = launched.os_pid;
        let cancel = CancellationToken::new();
        *self.active_pid.lock().expect("active_pid lock poisoned") = Some(os_pid);
        *self.active_cancel.lock().expect("active_cancel lock poisoned") = Some(cancel.clone());
        let _ = self
            .process_tracker
            .register(os_pid, self.command.label(), None)
            .await;

        let stdout_lines = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let collected = Arc::clone(&stdout_lines);
        spawn_log_readers(&mut launched.child, move |line| {
            debug!(line = %line, "one-shot worker output");
            collected.lock().expect("stdout buffer lock poisoned").push(line);
        });

        let exit = tokio::select! {
            status = launched.child.wait() => status,
            () = cancel.cancelled() => {
                let _ = kill_pid(os_pid).await;
                self.process_tracker.unregister(os_pid).await;
                *self.active_pid.lock().expect("active_pid lock poisoned") = None;
                *self.active_cancel.lock().expect("active_cancel lock poisoned") = None;
                return Err(ServerError::Aborted);
            }
        };

        self.process_tracker.unregister(os_pid).await;
        *self.active_pid.lock().expect("active_pid lock poisoned") = None;
        *self.active_cancel.lock().expect("active_cancel lock poisoned") = None;

        let exit_code = exit.ok().and_then(|status| status.code());
        let tail = stdout_lines.lock().expect("stdout buffer lock poisoned").clone();
        let payload = self.command.parse_output(&tail, exit_code)?;
        Ok(GenerationResult { payload })
    }

    /// Signal the in-flight `generate` call to kill its child process and
    /// return "aborted by user."
    async fn abort(&self) {
        let cancel = self.active_cancel.lock().expect("active_cancel lock poisoned").clone();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
    }

    /// No persistent process to stop between requests.
    async fn stop(&self) {}
}
