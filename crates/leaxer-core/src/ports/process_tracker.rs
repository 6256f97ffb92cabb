//! Process Tracker port.
//!
//! Abstracts the registry of external OS processes so the rest of the
//! core can be tested without spawning anything.

use async_trait::async_trait;

use super::ProcessError;
use crate::domain::TrackedProcess;

/// Registry of externally spawned OS processes, indexed by PID and by
/// listening port.
#[async_trait]
pub trait ProcessTrackerPort: Send + Sync {
    /// Register a newly spawned process. Calling twice for the same PID
    /// is not permitted; implementations may log and overwrite.
    async fn register(&self, os_pid: u32, label: &str, port: Option<u16>) -> Result<(), ProcessError>;

    /// Stop tracking a process. Idempotent.
    async fn unregister(&self, os_pid: u32);

    /// Look up the PID currently bound to `port`, if any.
    async fn find_by_port(&self, port: u16) -> Option<u32>;

    /// Kill whatever process is bound to `port` and wait briefly for the
    /// OS to release it.
    async fn kill_by_port(&self, port: u16) -> Result<u32, ProcessError>;

    /// Look up the tracked record for `os_pid`, if any.
    async fn lookup(&self, os_pid: u32) -> Option<TrackedProcess>;

    /// Verify every tracked PID is still alive; drop dead entries from
    /// both indices.
    async fn health_check(&self);

    /// Kill any process left over from a previous crash, matched by
    /// executable name pattern (`sd-*`, `llama-*`, `sd-server-*`).
    async fn sweep_orphans(&self);
}
