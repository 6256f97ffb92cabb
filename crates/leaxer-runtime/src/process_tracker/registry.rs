//! Dual-indexed registry of externally spawned OS processes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use leaxer_core::domain::TrackedProcess;
use leaxer_core::ports::{ProcessError, ProcessTrackerPort};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::health::check_liveness_batch;
use crate::pidfile::{delete_pidfile, is_expected_binary, list_pidfiles, write_pidfile};
use crate::shutdown::kill_pid;

/// Labels the tracker itself registers processes under (see
/// `ImageVariant::label`, `TextVariant::label`, `VideoOneShot::label`).
/// `sweep_orphans` only acts on pidfiles left behind by one of these, so a
/// stray pidfile from an unrelated tool on the same machine is ignored.
const ORPHAN_LABELS: &[&str] = &["image-server", "text-server", "video-cli"];

/// Tracks every OS process this application has spawned, indexed by PID
/// and (when the process listens on one) by port.
///
/// Calling code registers a process right after spawning it and
/// unregisters it when the owning actor tears down; `health_check` runs
/// on its own interval (driven by the bootstrap layer) to reap anything
/// whose owner died without unregistering.
pub struct ProcessTracker {
    by_pid: RwLock<HashMap<u32, TrackedProcess>>,
    by_port: RwLock<HashMap<u16, u32>>,
    /// Expected binary paths for orphan-sweep verification, by label
    /// prefix (e.g. `"sd-server"` -> the resolved executable path).
    known_binaries: Vec<PathBuf>,
}

impl ProcessTracker {
    #[must_use]
    pub fn new(known_binaries: Vec<PathBuf>) -> Self {
        Self {
            by_pid: RwLock::new(HashMap::new()),
            by_port: RwLock::new(HashMap::new()),
            known_binaries,
        }
    }

    /// Spawn the periodic liveness sweep as its own task, returning a
    /// handle the bootstrap layer can abort on shutdown.
    pub fn spawn_periodic_health_check(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                tracker.health_check().await;
            }
        })
    }
}

#[async_trait]
impl ProcessTrackerPort for ProcessTracker {
    async fn register(&self, os_pid: u32, label: &str, port: Option<u16>) -> Result<(), ProcessError> {
        let record = TrackedProcess::new(os_pid, label, port, Utc::now());

        {
            let mut by_pid = self.by_pid.write().await;
            if by_pid.contains_key(&os_pid) {
                warn!(os_pid, "registering an already-tracked PID, overwriting");
            }
            by_pid.insert(os_pid, record);
        }

        if let Some(port) = port {
            let mut by_port = self.by_port.write().await;
            by_port.insert(port, os_pid);
        }

        // Persisted so a startup sweep can find and kill this process if
        // the app crashes before `unregister` ever runs (§4.1).
        if let Err(e) = write_pidfile(label, os_pid, port.unwrap_or(0)) {
            warn!(os_pid, label, error = %e, "failed to persist pidfile");
        }

        Ok(())
    }

    async fn unregister(&self, os_pid: u32) {
        let removed = self.by_pid.write().await.remove(&os_pid);
        if let Some(record) = removed {
            if let Some(port) = record.port {
                self.by_port.write().await.remove(&port);
            }
            let _ = delete_pidfile(&record.label);
        }
    }

    async fn find_by_port(&self, port: u16) -> Option<u32> {
        self.by_port.read().await.get(&port).copied()
    }

    async fn kill_by_port(&self, port: u16) -> Result<u32, ProcessError> {
        let os_pid = self
            .find_by_port(port)
            .await
            .ok_or(ProcessError::NotTracked(0))?;

        kill_pid(os_pid)
            .await
            .map_err(|e| ProcessError::KillFailed {
                pid: os_pid,
                reason: e.to_string(),
            })?;

        // Give the OS a moment to release the socket before the port is
        // considered free again; TIME_WAIT can outlast this in the worst
        // case, so this is a best-effort wait, not a guarantee.
        tokio::time::sleep(Duration::from_millis(500)).await;

        self.unregister(os_pid).await;
        Ok(os_pid)
    }

    async fn lookup(&self, os_pid: u32) -> Option<TrackedProcess> {
        self.by_pid.read().await.get(&os_pid).cloned()
    }

    async fn health_check(&self) {
        let pids: Vec<u32> = self.by_pid.read().await.keys().copied().collect();
        if pids.is_empty() {
            return;
        }

        let liveness = check_liveness_batch(&pids);
        for (pid, alive) in liveness {
            if !alive {
                debug!(pid, "process tracker reaping dead entry");
                self.unregister(pid).await;
            }
        }
    }

    async fn sweep_orphans(&self) {
        let Ok(pidfiles) = list_pidfiles() else {
            return;
        };

        for (label, data) in pidfiles {
            let matches_known_label = ORPHAN_LABELS.contains(&label.as_str());
            let verified = matches_known_label
                && self
                    .known_binaries
                    .iter()
                    .any(|path| is_expected_binary(data.pid, path));

            if verified {
                debug!(pid = data.pid, port = data.port, label = %label, "killing orphaned server");
                if let Err(e) = kill_pid(data.pid).await {
                    warn!(pid = data.pid, error = %e, "failed to kill orphaned server");
                }
            }

            let _ = delete_pidfile(&label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_lookup_roundtrip() {
        let tracker = ProcessTracker::new(Vec::new());
        tracker.register(4242, "image-server", Some(1234)).await.unwrap();

        assert_eq!(tracker.find_by_port(1234).await, Some(4242));
        assert!(tracker.lookup(4242).await.is_some());

        tracker.unregister(4242).await;
        assert_eq!(tracker.find_by_port(1234).await, None);
        assert!(tracker.lookup(4242).await.is_none());
    }

    #[tokio::test]
    async fn health_check_reaps_dead_pid() {
        let tracker = ProcessTracker::new(Vec::new());
        tracker.register(999_999, "dead", None).await.unwrap();
        tracker.health_check().await;
        assert!(tracker.lookup(999_999).await.is_none());
    }

    #[tokio::test]
    async fn both_indices_stay_consistent() {
        let tracker = ProcessTracker::new(Vec::new());
        tracker.register(1, "a", Some(100)).await.unwrap();
        tracker.register(2, "b", Some(200)).await.unwrap();
        tracker.unregister(1).await;

        assert_eq!(tracker.find_by_port(100).await, None);
        assert_eq!(tracker.find_by_port(200).await, Some(2));
    }
}
