//! Settings domain types and validation.
//!
//! Pure domain types with no infrastructure dependencies; loading from
//! `leaxer.toml`/environment variables is the bootstrap layer's job.

use serde::{Deserialize, Serialize};

/// Default listen port for the image-generation server.
pub const DEFAULT_IMAGE_SERVER_PORT: u16 = 1234;

/// Default listen port for the text-generation server.
pub const DEFAULT_TEXT_SERVER_PORT: u16 = 8080;

/// Default context size passed to the text-generation server.
pub const DEFAULT_CONTEXT_SIZE: u32 = 8192;

/// Default interval between Process Tracker liveness sweeps.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 60_000;

/// Default size of the in-memory log ring buffer.
pub const DEFAULT_LOG_RING_SIZE: usize = 1000;

/// Default batching window for the log broadcaster.
pub const DEFAULT_LOG_BATCH_MS: u64 = 100;

/// Application settings structure.
///
/// All fields are optional to support partial updates and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Listen port for the image-generation model server.
    pub image_server_port: Option<u16>,

    /// Listen port for the text-generation model server.
    pub text_server_port: Option<u16>,

    /// Default context size for the text-generation server.
    pub context_size: Option<u32>,

    /// Whether the queue re-orders pending jobs by cached model path.
    pub batching_enabled: Option<bool>,

    /// Interval between Process Tracker liveness sweeps, in milliseconds.
    pub health_check_interval_ms: Option<u64>,

    /// Capacity of the in-memory log ring buffer.
    pub log_ring_size: Option<usize>,

    /// Log broadcaster batching window, in milliseconds.
    pub log_batch_ms: Option<u64>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            image_server_port: Some(DEFAULT_IMAGE_SERVER_PORT),
            text_server_port: Some(DEFAULT_TEXT_SERVER_PORT),
            context_size: Some(DEFAULT_CONTEXT_SIZE),
            batching_enabled: Some(true),
            health_check_interval_ms: Some(DEFAULT_HEALTH_CHECK_INTERVAL_MS),
            log_ring_size: Some(DEFAULT_LOG_RING_SIZE),
            log_batch_ms: Some(DEFAULT_LOG_BATCH_MS),
        }
    }

    #[must_use]
    pub const fn effective_image_server_port(&self) -> u16 {
        match self.image_server_port {
            Some(port) => port,
            None => DEFAULT_IMAGE_SERVER_PORT,
        }
    }

    #[must_use]
    pub const fn effective_text_server_port(&self) -> u16 {
        match self.text_server_port {
            Some(port) => port,
            None => DEFAULT_TEXT_SERVER_PORT,
        }
    }

    #[must_use]
    pub const fn effective_context_size(&self) -> u32 {
        match self.context_size {
            Some(size) => size,
            None => DEFAULT_CONTEXT_SIZE,
        }
    }

    #[must_use]
    pub const fn effective_batching_enabled(&self) -> bool {
        match self.batching_enabled {
            Some(enabled) => enabled,
            None => true,
        }
    }

    #[must_use]
    pub const fn effective_health_check_interval_ms(&self) -> u64 {
        match self.health_check_interval_ms {
            Some(ms) => ms,
            None => DEFAULT_HEALTH_CHECK_INTERVAL_MS,
        }
    }

    #[must_use]
    pub const fn effective_log_ring_size(&self) -> usize {
        match self.log_ring_size {
            Some(size) => size,
            None => DEFAULT_LOG_RING_SIZE,
        }
    }

    #[must_use]
    pub const fn effective_log_batch_ms(&self) -> u64 {
        match self.log_batch_ms {
            Some(ms) => ms,
            None => DEFAULT_LOG_BATCH_MS,
        }
    }

    /// Merge a partial update into this settings value.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(port) = other.image_server_port {
            self.image_server_port = port;
        }
        if let Some(port) = other.text_server_port {
            self.text_server_port = port;
        }
        if let Some(size) = other.context_size {
            self.context_size = size;
        }
        if let Some(enabled) = other.batching_enabled {
            self.batching_enabled = enabled;
        }
        if let Some(ms) = other.health_check_interval_ms {
            self.health_check_interval_ms = ms;
        }
        if let Some(size) = other.log_ring_size {
            self.log_ring_size = size;
        }
        if let Some(ms) = other.log_batch_ms {
            self.log_batch_ms = ms;
        }
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = set field to None/default
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub image_server_port: Option<Option<u16>>,
    pub text_server_port: Option<Option<u16>>,
    pub context_size: Option<Option<u32>>,
    pub batching_enabled: Option<Option<bool>>,
    pub health_check_interval_ms: Option<Option<u64>>,
    pub log_ring_size: Option<Option<usize>>,
    pub log_batch_ms: Option<Option<u64>>,
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Port should be >= 1024 (privileged ports require root), got {0}")]
    InvalidPort(u16),

    #[error("Context size must be between 512 and 1,000,000, got {0}")]
    InvalidContextSize(u32),

    #[error("Log ring size must be between 1 and 100,000, got {0}")]
    InvalidLogRingSize(usize),

    #[error("Log batch window must be between 1 and 60,000 ms, got {0}")]
    InvalidLogBatchMs(u64),
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if let Some(port) = settings.image_server_port {
        if port < 1024 {
            return Err(SettingsError::InvalidPort(port));
        }
    }
    if let Some(port) = settings.text_server_port {
        if port < 1024 {
            return Err(SettingsError::InvalidPort(port));
        }
    }
    if let Some(size) = settings.context_size {
        if !(512..=1_000_000).contains(&size) {
            return Err(SettingsError::InvalidContextSize(size));
        }
    }
    if let Some(size) = settings.log_ring_size {
        if !(1..=100_000).contains(&size) {
            return Err(SettingsError::InvalidLogRingSize(size));
        }
    }
    if let Some(ms) = settings.log_batch_ms {
        if !(1..=60_000).contains(&ms) {
            return Err(SettingsError::InvalidLogBatchMs(ms));
        }
    }
    Ok(())
}
