//! JSON-file Job Queue persistence (§6 ADDED), following the same
//! temp-file-then-rename atomic write `pidfile::io` uses for PID files.

use std::fs;
use std::io;

use async_trait::async_trait;
use leaxer_core::paths::queue_state_path;
use leaxer_core::ports::{PersistedQueueState, QueueError, QueueStorePort};

/// Persists `PersistedQueueState` as a single JSON file at
/// `queue_state_path()`.
pub struct JsonQueueStore;

impl JsonQueueStore {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for JsonQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStorePort for JsonQueueStore {
    async fn load(&self) -> Result<Option<PersistedQueueState>, QueueError> {
        let path = queue_state_path().map_err(|e| QueueError::PersistenceFailed(e.to_string()))?;

        match fs::read_to_string(&path) {
            Ok(content) => {
                let state = serde_json::from_str(&content)
                    .map_err(|e| QueueError::PersistenceFailed(e.to_string()))?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(QueueError::PersistenceFailed(e.to_string())),
        }
    }

    async fn save(&self, state: &PersistedQueueState) -> Result<(), QueueError> {
        let path = queue_state_path().map_err(|e| QueueError::PersistenceFailed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| QueueError::PersistenceFailed(e.to_string()))?;
        }

        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| QueueError::PersistenceFailed(e.to_string()))?;

        fs::write(&temp_path, content).map_err(|e| QueueError::PersistenceFailed(e.to_string()))?;
        fs::rename(&temp_path, &path).map_err(|e| QueueError::PersistenceFailed(e.to_string()))?;

        Ok(())
    }
}
