//! Tracked process domain type.
//!
//! `TrackedProcess` is the Process Tracker's record for a single external
//! OS process. The tracker owns the storage; the owning actor holds a
//! `monitor_token` it drops (or signals) when it shuts down.

use chrono::{DateTime, Utc};

/// Record kept by the Process Tracker for a single spawned OS process.
#[derive(Debug, Clone)]
pub struct TrackedProcess {
    pub os_pid: u32,
    pub label: String,
    pub port: Option<u16>,
    pub registered_at: DateTime<Utc>,
}

impl TrackedProcess {
    #[must_use]
    pub fn new(os_pid: u32, label: impl Into<String>, port: Option<u16>, registered_at: DateTime<Utc>) -> Self {
        Self {
            os_pid,
            label: label.into(),
            port,
            registered_at,
        }
    }
}
