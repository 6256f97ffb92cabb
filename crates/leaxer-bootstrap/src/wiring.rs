//! Composition root (§2.1): the one place allowed to construct concrete
//! adapters and wire them behind the trait objects the rest of the
//! system depends on. Grounded on `gglib_cli::bootstrap`'s `CliContext`
//! / `bootstrap()` shape.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use leaxer_core::events::ServerKind;
use leaxer_core::ports::EventBusPort;
use leaxer_runtime::graph::Workers;
use leaxer_runtime::model_server::{
    ImageOneShot, ImageVariant, TextOneShot, TextVariant, VideoOneShot, image_cli_binary_name, resolve_binary,
    text_cli_binary_name, video_binary_name,
};
use leaxer_runtime::{
    CliOneShotWorker, EventBus, ExecutionStateStore, GraphRuntime, JobQueue, JsonQueueStore, ProcessTracker,
    ServerManager, ServerWithFallback,
};
use tracing::info;

use crate::config::BootstrapConfig;

/// Everything a command handler needs: the fully wired Job Queue plus
/// the adapters a handler might want direct access to (e.g. `Paths`
/// diagnostics don't touch the queue at all).
pub struct AppContext {
    pub queue: Arc<JobQueue>,
    pub event_bus: Arc<EventBus>,
    pub process_tracker: Arc<ProcessTracker>,
    pub bin_dir: PathBuf,
    health_check_handle: tokio::task::JoinHandle<()>,
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.health_check_handle.abort();
    }
}

/// Build every component and wire them together (§2.1):
/// 1. Process Tracker, Event Bus, Execution State Store.
/// 2. The two persistent Model Server Managers, each composed with its
///    CLI one-shot counterpart so a missing server binary (§4.3
///    `NotAvailable`) downgrades transparently instead of failing the
///    job, plus the video CLI one-shot worker (which has no persistent
///    server variant at all).
/// 3. The Graph Runtime and Job Queue, restoring any persisted state.
/// 4. The startup orphan sweep and the periodic health-check task.
///
/// # Errors
///
/// Returns an error if restoring persisted queue state fails (a
/// corrupt or unreadable `queue_state.json`).
pub async fn bootstrap(config: &BootstrapConfig) -> Result<Arc<AppContext>> {
    let known_binaries = known_binary_paths(&config.bin_dir);

    let process_tracker = Arc::new(ProcessTracker::new(known_binaries));
    let event_bus = Arc::new(EventBus::new());

    info!("running startup orphan sweep");
    process_tracker.sweep_orphans().await;

    let image_server = Arc::new(ServerManager::new(
        ImageVariant,
        config.settings.effective_image_server_port(),
        config.bin_dir.clone(),
        leaxer_core::domain::ComputeBackend::Cpu,
        ServerKind::Image,
        process_tracker.clone() as Arc<dyn leaxer_core::ports::ProcessTrackerPort>,
        event_bus.clone() as Arc<dyn EventBusPort>,
    ));
    let image_one_shot = Arc::new(CliOneShotWorker::new(
        ImageOneShot::default(),
        config.bin_dir.clone(),
        process_tracker.clone() as Arc<dyn leaxer_core::ports::ProcessTrackerPort>,
    ));
    let image_worker: Arc<dyn leaxer_core::ports::ModelServerPort> =
        Arc::new(ServerWithFallback::new(image_server, image_one_shot));

    let text_server = Arc::new(ServerManager::new(
        TextVariant,
        config.settings.effective_text_server_port(),
        config.bin_dir.clone(),
        leaxer_core::domain::ComputeBackend::Cpu,
        ServerKind::Text,
        process_tracker.clone() as Arc<dyn leaxer_core::ports::ProcessTrackerPort>,
        event_bus.clone() as Arc<dyn EventBusPort>,
    ));
    let text_one_shot = Arc::new(CliOneShotWorker::new(
        TextOneShot::default(),
        config.bin_dir.clone(),
        process_tracker.clone() as Arc<dyn leaxer_core::ports::ProcessTrackerPort>,
    ));
    let text_worker: Arc<dyn leaxer_core::ports::ModelServerPort> =
        Arc::new(ServerWithFallback::new(text_server, text_one_shot));

    let video_worker = Arc::new(CliOneShotWorker::new(
        VideoOneShot::default(),
        config.bin_dir.clone(),
        process_tracker.clone() as Arc<dyn leaxer_core::ports::ProcessTrackerPort>,
    ));

    let workers = Arc::new(Workers::new(image_worker, text_worker, video_worker));
    let execution_state = Arc::new(ExecutionStateStore::new());
    let graph_runtime = Arc::new(GraphRuntime::new(workers, event_bus.clone() as Arc<dyn EventBusPort>, execution_state));

    let store = Arc::new(JsonQueueStore::new());
    let queue = JobQueue::new(
        store,
        event_bus.clone() as Arc<dyn EventBusPort>,
        graph_runtime,
        config.settings.effective_batching_enabled(),
    )
    .await
    .context("restoring persisted queue state")?;

    let health_check_handle = process_tracker.spawn_periodic_health_check(Duration::from_millis(
        config.settings.effective_health_check_interval_ms(),
    ));

    Ok(Arc::new(AppContext {
        queue,
        event_bus,
        process_tracker,
        bin_dir: config.bin_dir.clone(),
        health_check_handle,
    }))
}

/// Every binary the orphan sweep should treat as "one of ours": whichever
/// backend variant currently resolves in `bin_dir` for each worker kind,
/// persistent server and CLI one-shot alike. A missing binary for a
/// given worker just means that worker's `ServerWithFallback` (image,
/// text) or bare `CliOneShotWorker` (video) reports `NotAvailable` at
/// dispatch time (§4.3, §7); it isn't a bootstrap error.
fn known_binary_paths(bin_dir: &std::path::Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for backend in [
        leaxer_core::domain::ComputeBackend::Cpu,
        leaxer_core::domain::ComputeBackend::Cuda,
        leaxer_core::domain::ComputeBackend::Metal,
        leaxer_core::domain::ComputeBackend::Directml,
    ] {
        if let Some((_, path)) = resolve_binary(bin_dir, &ImageVariant, backend) {
            paths.push(path);
        }
        if let Some((_, path)) = resolve_binary(bin_dir, &TextVariant, backend) {
            paths.push(path);
        }
        let video_path = bin_dir.join(video_binary_name(backend));
        if video_path.exists() {
            paths.push(video_path);
        }
        let image_cli_path = bin_dir.join(image_cli_binary_name(backend));
        if image_cli_path.exists() {
            paths.push(image_cli_path);
        }
        let text_cli_path = bin_dir.join(text_cli_binary_name(backend));
        if text_cli_path.exists() {
            paths.push(text_cli_path);
        }
    }
    paths.sort();
    paths.dedup();
    paths
}
