//! Generic Model Server Manager (§4.3): the state machine shared by the
//! image and text variants, parameterized over `ServerVariant`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use leaxer_core::domain::{ComputeBackend, PendingRequest, ServerState, ServerStatus, StartupParams};
use leaxer_core::events::{AppEvent, ServerKind};
use leaxer_core::ports::{
    EventBusPort, GenerationRequest, GenerationResult, ModelServerPort, ProcessTrackerPort, ServerError,
};
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::parse_progress_line;
use super::variant::{ServerVariant, resolve_binary};
use crate::launcher::{LaunchSpec, spawn, spawn_log_readers};

type PendingReply = oneshot::Sender<Result<GenerationResult, ServerError>>;
type PendingEntry = (GenerationRequest, PendingReply);

const STARTUP_SOFT_WARNING: Duration = Duration::from_secs(30);
const STARTUP_HARD_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL_FAST: Duration = Duration::from_secs(2);
const POLL_INTERVAL_SLOW: Duration = Duration::from_secs(5);
const QUICK_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

struct Inner {
    state: ServerState<PendingEntry>,
    cancel: CancellationToken,
    generation: u64,
    /// Last time a request was submitted, read by the idle-unload timer
    /// to decide whether the server has actually been sitting unused.
    last_activity: tokio::time::Instant,
}

/// Long-lived supervisor of a single external inference server. One
/// instance per variant (image, text); both share this implementation.
pub struct ServerManager<V: ServerVariant> {
    variant: Arc<V>,
    inner: Arc<Mutex<Inner>>,
    process_tracker: Arc<dyn ProcessTrackerPort>,
    event_bus: Arc<dyn EventBusPort>,
    http: reqwest::Client,
    bin_dir: PathBuf,
    server_kind: ServerKind,
    requested_backend: ComputeBackend,
    /// `(job_id, node_id)` of the request currently flowing through the
    /// server, read by the synchronous stdout-reader closure to annotate
    /// progress events; written by `dispatch` before each POST.
    current_annotation: Arc<StdMutex<Option<(String, String)>>>,
}

impl<V: ServerVariant> ServerManager<V> {
    #[must_use]
    pub fn new(
        variant: V,
        listen_port: u16,
        bin_dir: PathBuf,
        requested_backend: ComputeBackend,
        server_kind: ServerKind,
        process_tracker: Arc<dyn ProcessTrackerPort>,
        event_bus: Arc<dyn EventBusPort>,
    ) -> Self {
        Self {
            variant: Arc::new(variant),
            inner: Arc::new(Mutex::new(Inner {
                state: ServerState::idle(listen_port),
                cancel: CancellationToken::new(),
                generation: 0,
                last_activity: tokio::time::Instant::now(),
            })),
            process_tracker,
            event_bus,
            http: reqwest::Client::new(),
            bin_dir,
            server_kind,
            requested_backend,
            current_annotation: Arc::new(StdMutex::new(None)),
        }
    }

    async fn submit(&self, request: GenerationRequest, reply: PendingReply) {
        let model = request.model_path.clone();
        let params = request.startup_params.clone();

        let mut inner = self.inner.lock().await;
        inner.last_activity = tokio::time::Instant::now();
        if inner.state.matches(&model, &params) {
            let port = inner.state.listen_port;
            drop(inner);
            if self.probe_health(port, QUICK_HEALTH_TIMEOUT).await {
                self.dispatch(request, reply).await;
                return;
            }
            inner = self.inner.lock().await;
        }

        if inner.state.status == ServerStatus::Starting {
            inner.state.pending_requests.push(PendingRequest {
                request: (request, reply),
                enqueued_at: Utc::now(),
            });
            return;
        }

        if let Some(_pid) = inner.state.os_pid {
            let port = inner.state.listen_port;
            drop(inner);
            let _ = self.process_tracker.kill_by_port(port).await;
            inner = self.inner.lock().await;
        }

        inner.generation += 1;
        let generation = inner.generation;
        let cancel = CancellationToken::new();
        inner.cancel = cancel.clone();
        inner.state.status = ServerStatus::Starting;
        inner.state.current_model = Some(model);
        inner.state.startup_params = params;
        inner.state.pending_requests.push(PendingRequest {
            request: (request, reply),
            enqueued_at: Utc::now(),
        });
        let listen_port = inner.state.listen_port;
        drop(inner);

        self.event_bus.publish(AppEvent::ServerStatusChanged {
            server: self.server_kind,
            status: ServerStatus::Starting,
        });

        let this = self.clone_handles();
        tokio::spawn(async move { this.run_start(generation, listen_port, cancel).await });
    }

    /// Cheap struct of `Arc`-cloned fields a background task needs,
    /// avoiding an `Arc<Self>` self-reference.
    fn clone_handles(&self) -> StartHandles<V> {
        StartHandles {
            variant: Arc::clone(&self.variant),
            inner: Arc::clone(&self.inner),
            process_tracker: Arc::clone(&self.process_tracker),
            event_bus: Arc::clone(&self.event_bus),
            http: self.http.clone(),
            bin_dir: self.bin_dir.clone(),
            server_kind: self.server_kind,
            requested_backend: self.requested_backend,
            current_annotation: Arc::clone(&self.current_annotation),
        }
    }

    async fn dispatch(&self, request: GenerationRequest, reply: PendingReply) {
        let (path, body) = self.variant.build_request(&request);
        let (port, cancel) = {
            let guard = self.inner.lock().await;
            (guard.state.listen_port, guard.cancel.clone())
        };
        let http = self.http.clone();
        let timeout = self.variant.request_timeout();
        *self.current_annotation.lock().expect("annotation lock poisoned") =
            Some((request.job_id.clone(), request.node_id.clone()));

        tokio::spawn(async move {
            let url = format!("http://127.0.0.1:{port}{path}");
            let send = http.post(&url).timeout(timeout).json(&body).send();
            let result = tokio::select! {
                () = cancel.cancelled() => Err(ServerError::Aborted),
                response = send => match response {
                    Ok(resp) if resp.status().is_success() => resp
                        .json::<serde_json::Value>()
                        .await
                        .map(|payload| GenerationResult { payload })
                        .map_err(|e| ServerError::HttpFailure(e.to_string())),
                    Ok(resp) => Err(ServerError::HttpFailure(format!("status {}", resp.status()))),
                    Err(e) => Err(ServerError::HttpFailure(e.to_string())),
                },
            };
            let _ = reply.send(result);
        });
    }

    async fn probe_health(&self, port: u16, timeout: Duration) -> bool {
        let url = format!("http://127.0.0.1:{port}{}", self.variant.health_path());
        self.http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// `Arc`-cloned fields needed by the background start/monitor tasks.
struct StartHandles<V: ServerVariant> {
    variant: Arc<V>,
    inner: Arc<Mutex<Inner>>,
    process_tracker: Arc<dyn ProcessTrackerPort>,
    event_bus: Arc<dyn EventBusPort>,
    http: reqwest::Client,
    bin_dir: PathBuf,
    server_kind: ServerKind,
    requested_backend: ComputeBackend,
    current_annotation: Arc<StdMutex<Option<(String, String)>>>,
}

impl<V: ServerVariant> StartHandles<V> {
    async fn run_start(&self, generation: u64, listen_port: u16, cancel: CancellationToken) {
        let (model, params) = {
            let guard = self.inner.lock().await;
            (
                guard.state.current_model.clone().expect("set by submit before spawning run_start"),
                guard.state.startup_params.clone(),
            )
        };

        let Some((backend, exe_path)) = resolve_binary(&self.bin_dir, self.variant.as_ref(), self.requested_backend)
        else {
            self.fail_generation(generation, ServerError::NotAvailable).await;
            return;
        };
        if backend != self.requested_backend {
            warn!(?backend, requested = ?self.requested_backend, "substituting compute backend: binary not available");
        }

        let args = self.variant.build_args(&model, &params, listen_port);
        let spec = LaunchSpec {
            exe_path,
            args,
            bin_dir: self.bin_dir.clone(),
            extra_env: Vec::new(),
        };

        let mut launched = match spawn(&spec) {
            Ok(launched) => launched,
            Err(e) => {
                self.fail_generation(generation, ServerError::SpawnFailed(e.to_string())).await;
                return;
            }
        };
        let os_pid = launched.os_pid;
        let _ = self.process_tracker.register(os_pid, self.variant.label(), Some(listen_port)).await;

        let (banner_tx, banner_rx) = oneshot::channel::<()>();
        let banner_tx = Arc::new(StdMutex::new(Some(banner_tx)));
        let markers = self.variant.banner_markers();
        let regex = self.variant.progress_regex();
        let event_bus = Arc::clone(&self.event_bus);
        let server_kind = self.server_kind;
        let annotation = Arc::clone(&self.current_annotation);

        spawn_log_readers(&mut launched.child, move |line| {
            event_bus.publish(AppEvent::ServerLogLine {
                server: server_kind,
                line: line.clone(),
            });
            if markers.iter().any(|m| line.contains(m)) {
                if let Some(tx) = banner_tx.lock().expect("banner lock poisoned").take() {
                    let _ = tx.send(());
                }
            }
            if let Some(progress) = parse_progress_line(&line, regex) {
                if let Some((job_id, node_id)) = annotation.lock().expect("annotation lock poisoned").clone() {
                    event_bus.publish(AppEvent::GenerationProgress {
                        job_id,
                        node_id,
                        progress: leaxer_core::domain::StepProgress::new(progress.current, progress.total),
                        phase: progress.phase,
                    });
                }
            }
        });

        let ready = tokio::select! {
            _ = banner_rx => true,
            ok = self.poll_until_ready(listen_port) => ok,
            () = cancel.cancelled() => {
                let _ = self.process_tracker.kill_by_port(listen_port).await;
                self.fail_generation(generation, ServerError::Aborted).await;
                return;
            }
        };

        if !ready {
            let _ = self.process_tracker.kill_by_port(listen_port).await;
            self.fail_generation(generation, ServerError::StartupTimeout).await;
            return;
        }

        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            // Superseded by a newer start or an abort while we were starting.
            return;
        }
        guard.state.status = ServerStatus::Ready;
        guard.state.os_pid = Some(os_pid);
        guard.state.compute_backend = Some(backend);
        guard.state.start_time = Some(Utc::now());
        let pending = std::mem::take(&mut guard.state.pending_requests);
        drop(guard);

        self.event_bus.publish(AppEvent::ServerStatusChanged {
            server: self.server_kind,
            status: ServerStatus::Ready,
        });

        for PendingRequest { request: (request, reply), .. } in pending {
            self.dispatch_from_ready(request, reply).await;
        }

        self.spawn_exit_watcher(generation, os_pid, launched.child);
    }

    async fn poll_until_ready(&self, port: u16) -> bool {
        let url = format!("http://127.0.0.1:{port}{}", self.variant.health_path());
        let start = tokio::time::Instant::now();
        loop {
            if self
                .http
                .get(&url)
                .timeout(Duration::from_secs(2))
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false)
            {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= STARTUP_HARD_TIMEOUT {
                return false;
            }
            if elapsed >= STARTUP_SOFT_WARNING {
                debug!(port, "model server still not ready past soft startup warning");
            }
            let interval = if elapsed < STARTUP_SOFT_WARNING { POLL_INTERVAL_FAST } else { POLL_INTERVAL_SLOW };
            tokio::time::sleep(interval).await;
        }
    }

    async fn dispatch_from_ready(&self, request: GenerationRequest, reply: PendingReply) {
        let (path, body) = self.variant.build_request(&request);
        let (port, cancel) = {
            let guard = self.inner.lock().await;
            (guard.state.listen_port, guard.cancel.clone())
        };
        let http = self.http.clone();
        let timeout = self.variant.request_timeout();
        *self.current_annotation.lock().expect("annotation lock poisoned") =
            Some((request.job_id.clone(), request.node_id.clone()));

        tokio::spawn(async move {
            let url = format!("http://127.0.0.1:{port}{path}");
            let send = http.post(&url).timeout(timeout).json(&body).send();
            let result = tokio::select! {
                () = cancel.cancelled() => Err(ServerError::Aborted),
                response = send => match response {
                    Ok(resp) if resp.status().is_success() => resp
                        .json::<serde_json::Value>()
                        .await
                        .map(|payload| GenerationResult { payload })
                        .map_err(|e| ServerError::HttpFailure(e.to_string())),
                    Ok(resp) => Err(ServerError::HttpFailure(format!("status {}", resp.status()))),
                    Err(e) => Err(ServerError::HttpFailure(e.to_string())),
                },
            };
            let _ = reply.send(result);
        });
    }

    async fn fail_generation(&self, generation: u64, error_for_each: ServerError) {
        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            return;
        }
        let port = guard.state.listen_port;
        let pending = std::mem::take(&mut guard.state.pending_requests);
        guard.state = ServerState::idle(port);
        drop(guard);

        for PendingRequest { request: (_, reply), .. } in pending {
            let to_send = match &error_for_each {
                ServerError::NotAvailable => ServerError::NotAvailable,
                ServerError::SpawnFailed(m) => ServerError::SpawnFailed(m.clone()),
                ServerError::StartupTimeout => ServerError::StartupTimeout,
                ServerError::ServerCrashed(code) => ServerError::ServerCrashed(*code),
                ServerError::HttpFailure(m) => ServerError::HttpFailure(m.clone()),
                ServerError::Aborted => ServerError::Aborted,
            };
            let _ = reply.send(Err(to_send));
        }

        self.event_bus.publish(AppEvent::ServerStatusChanged {
            server: self.server_kind,
            status: ServerStatus::Idle,
        });
    }

    fn spawn_exit_watcher(&self, generation: u64, _os_pid: u32, child: tokio::process::Child) {
        let inner = Arc::clone(&self.inner);
        let event_bus = Arc::clone(&self.event_bus);
        let server_kind = self.server_kind;

        tokio::spawn(async move {
            let mut child = child;
            let status = child.wait().await;

            let mut guard = inner.lock().await;
            if guard.generation != generation {
                return;
            }
            if guard.state.status == ServerStatus::Stopping {
                let port = guard.state.listen_port;
                guard.state = ServerState::idle(port);
                return;
            }

            let code = status.ok().and_then(|s| s.code());
            let port = guard.state.listen_port;
            let pending = std::mem::take(&mut guard.state.pending_requests);
            guard.state = ServerState::idle(port);
            drop(guard);

            for PendingRequest { request: (_, reply), .. } in pending {
                let _ = reply.send(Err(ServerError::ServerCrashed(code)));
            }

            event_bus.publish(AppEvent::ServerStatusChanged {
                server: server_kind,
                status: ServerStatus::Crashed,
            });
            info!(?code, "model server exited unexpectedly");
        });
    }
}

#[async_trait]
impl<V: ServerVariant> ModelServerPort for ServerManager<V> {
    async fn status(&self) -> ServerStatus {
        self.inner.lock().await.state.status
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, ServerError> {
        let (tx, rx) = oneshot::channel();
        self.submit(request, tx).await;
        rx.await.map_err(|_| ServerError::Aborted)?
    }

    async fn abort(&self) {
        let mut guard = self.inner.lock().await;
        guard.cancel.cancel();
        let port = guard.state.listen_port;
        let had_process = guard.state.os_pid.is_some();
        guard.generation += 1;
        let pending = std::mem::take(&mut guard.state.pending_requests);
        guard.state = ServerState::idle(port);
        drop(guard);

        for PendingRequest { request: (_, reply), .. } in pending {
            let _ = reply.send(Err(ServerError::Aborted));
        }

        if had_process {
            let _ = self.process_tracker.kill_by_port(port).await;
        }

        self.event_bus.publish(AppEvent::ServerStatusChanged {
            server: self.server_kind,
            status: ServerStatus::Idle,
        });
    }

    async fn stop(&self) {
        let mut guard = self.inner.lock().await;
        if guard.state.status != ServerStatus::Ready {
            return;
        }
        let port = guard.state.listen_port;
        guard.state.status = ServerStatus::Stopping;
        guard.generation += 1;
        drop(guard);

        let _ = self.process_tracker.kill_by_port(port).await;

        let mut guard = self.inner.lock().await;
        guard.state = ServerState::idle(port);
        drop(guard);

        self.event_bus.publish(AppEvent::ServerStatusChanged {
            server: self.server_kind,
            status: ServerStatus::Idle,
        });
    }

    /// §9 Open Question 3: `model_caching_strategy = "unload_after"` stops
    /// the server once it has sat idle (no dispatched request) for
    /// `after`. A subsequent `submit` bumps `last_activity`, so a timer
    /// that wakes early simply reschedules itself against the new
    /// deadline instead of stopping a server that got busy again.
    async fn schedule_idle_unload(&self, after: Duration) {
        let inner = Arc::clone(&self.inner);
        let process_tracker = Arc::clone(&self.process_tracker);
        let event_bus = Arc::clone(&self.event_bus);
        let server_kind = self.server_kind;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(after).await;

                let mut guard = inner.lock().await;
                if guard.state.status != ServerStatus::Ready {
                    return;
                }
                let elapsed = guard.last_activity.elapsed();
                if elapsed < after {
                    drop(guard);
                    continue;
                }

                let port = guard.state.listen_port;
                guard.state.status = ServerStatus::Stopping;
                guard.generation += 1;
                drop(guard);

                let _ = process_tracker.kill_by_port(port).await;

                let mut guard = inner.lock().await;
                guard.state = ServerState::idle(port);
                drop(guard);

                event_bus.publish(AppEvent::ServerStatusChanged { server: server_kind, status: ServerStatus::Idle });
                return;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use leaxer_core::domain::TrackedProcess;

    use super::*;
    use crate::model_server::image::ImageVariant;

    struct NoopTracker;

    #[async_trait]
    impl ProcessTrackerPort for NoopTracker {
        async fn register(&self, _os_pid: u32, _label: &str, _port: Option<u16>) -> Result<(), leaxer_core::ports::ProcessError> {
            Ok(())
        }
        async fn unregister(&self, _os_pid: u32) {}
        async fn find_by_port(&self, _port: u16) -> Option<u32> {
            None
        }
        async fn kill_by_port(&self, _port: u16) -> Result<u32, leaxer_core::ports::ProcessError> {
            Err(leaxer_core::ports::ProcessError::NotTracked(0))
        }
        async fn lookup(&self, _os_pid: u32) -> Option<TrackedProcess> {
            None
        }
        async fn health_check(&self) {}
        async fn sweep_orphans(&self) {}
    }

    struct NoopBus;

    #[async_trait]
    impl EventBusPort for NoopBus {
        fn publish(&self, _event: AppEvent) -> usize {
            0
        }
        fn subscribe(&self, _topic: leaxer_core::events::Topic) -> tokio_stream::wrappers::BroadcastStream<AppEvent> {
            let (tx, _rx) = tokio::sync::broadcast::channel(1);
            tokio_stream::wrappers::BroadcastStream::new(tx.subscribe())
        }
        fn recent_logs(&self, _count: usize) -> Vec<String> {
            Vec::new()
        }
    }

    fn manager() -> ServerManager<ImageVariant> {
        ServerManager::new(
            ImageVariant,
            1234,
            std::env::temp_dir(),
            ComputeBackend::Cpu,
            ServerKind::Image,
            Arc::new(NoopTracker),
            Arc::new(NoopBus),
        )
    }

    #[tokio::test]
    async fn starts_idle() {
        let manager = manager();
        assert_eq!(manager.status().await, ServerStatus::Idle);
    }

    #[tokio::test]
    async fn generate_with_missing_binary_reports_not_available() {
        let manager = manager();
        let request = GenerationRequest {
            job_id: "job1".to_string(),
            node_id: "node1".to_string(),
            model_path: PathBuf::from("model.safetensors"),
            startup_params: StartupParams::default(),
            options: serde_json::json!({"prompt": "a cat"}),
        };
        let result = manager.generate(request).await;
        assert!(matches!(result, Err(ServerError::NotAvailable)));
        assert_eq!(manager.status().await, ServerStatus::Idle);
    }

    #[tokio::test]
    async fn abort_on_idle_server_is_a_noop() {
        let manager = manager();
        manager.abort().await;
        assert_eq!(manager.status().await, ServerStatus::Idle);
    }

    #[tokio::test]
    async fn schedule_idle_unload_on_idle_server_is_a_noop() {
        let manager = manager();
        manager.schedule_idle_unload(Duration::from_millis(5)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.status().await, ServerStatus::Idle);
    }

    #[tokio::test]
    async fn schedule_idle_unload_stops_a_ready_server() {
        let manager = manager();
        {
            let mut guard = manager.inner.lock().await;
            guard.state.status = ServerStatus::Ready;
            guard.state.os_pid = Some(12345);
            guard.last_activity = tokio::time::Instant::now() - Duration::from_secs(10);
        }

        manager.schedule_idle_unload(Duration::from_millis(5)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.status().await, ServerStatus::Idle);
    }

    #[tokio::test]
    async fn schedule_idle_unload_spares_a_server_that_stays_busy() {
        let manager = manager();
        {
            let mut guard = manager.inner.lock().await;
            guard.state.status = ServerStatus::Ready;
            guard.state.os_pid = Some(12345);
            guard.last_activity = tokio::time::Instant::now();
        }

        manager.schedule_idle_unload(Duration::from_millis(30)).await;
        // Activity keeps landing before the window elapses.
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(15)).await;
            manager.inner.lock().await.last_activity = tokio::time::Instant::now();
        }
        assert_eq!(manager.status().await, ServerStatus::Ready);
    }
}
