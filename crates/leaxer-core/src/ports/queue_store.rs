//! Queue persistence port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::QueueError;
use crate::domain::Job;

/// The record written to disk on every queue mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedQueueState {
    pub jobs: Vec<Job>,
    pub batching_enabled: bool,
}

/// Best-effort crash-recovery persistence for the Job Queue.
///
/// Not a committed log (§1 Non-goals): a write that loses power mid-flight
/// may lose the most recent mutation, never corrupt the file (the atomic
/// temp-then-rename pattern of §6 guarantees that).
#[async_trait]
pub trait QueueStorePort: Send + Sync {
    async fn load(&self) -> Result<Option<PersistedQueueState>, QueueError>;

    async fn save(&self, state: &PersistedQueueState) -> Result<(), QueueError>;
}
