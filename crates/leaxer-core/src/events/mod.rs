//! Canonical event union published on the Event Bus.
//!
//! Topics form a closed set (§3/§4.6 of the design): the bus is built once
//! with one broadcast channel per `Topic` variant, never grown at runtime.

use serde::{Deserialize, Serialize};

use crate::domain::execution::StepProgress;

/// The closed set of Event Bus topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    QueueUpdates,
    QueueJobCompleted,
    QueueJobError,
    GenerationProgress,
    GenerationComplete,
    GenerationError,
    LlmStreaming,
    LlmComplete,
    LlmError,
    HardwareStats,
    LogsStream,
    ServerStatus,
    ServerLogs,
}

impl Topic {
    /// All topics, in a fixed order, for iterating when wiring the bus.
    pub const ALL: [Topic; 13] = [
        Topic::QueueUpdates,
        Topic::QueueJobCompleted,
        Topic::QueueJobError,
        Topic::GenerationProgress,
        Topic::GenerationComplete,
        Topic::GenerationError,
        Topic::LlmStreaming,
        Topic::LlmComplete,
        Topic::LlmError,
        Topic::HardwareStats,
        Topic::LogsStream,
        Topic::ServerStatus,
        Topic::ServerLogs,
    ];
}

/// Canonical payload carried on the Event Bus.
///
/// Each variant is self-describing: consumers never need to consult the
/// topic it arrived on to interpret the fields, though `AppEvent::topic()`
/// is provided for convenience when wiring a subscriber up to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    QueueUpdated {
        pending_count: usize,
        total_count: usize,
    },
    JobCompleted {
        job_id: String,
    },
    JobError {
        job_id: String,
        error: String,
    },
    GenerationProgress {
        job_id: String,
        node_id: String,
        progress: StepProgress,
        phase: GenerationPhase,
    },
    GenerationComplete {
        job_id: String,
        node_id: String,
    },
    GenerationError {
        job_id: String,
        node_id: String,
        error: String,
    },
    LlmStreaming {
        job_id: String,
        node_id: String,
        token_count: u32,
    },
    LlmComplete {
        job_id: String,
        node_id: String,
    },
    LlmError {
        job_id: String,
        node_id: String,
        error: String,
    },
    HardwareStats {
        payload: serde_json::Value,
    },
    LogLine {
        line: String,
    },
    ServerStatusChanged {
        server: ServerKind,
        status: crate::domain::server::ServerStatus,
    },
    ServerLogLine {
        server: ServerKind,
        line: String,
    },
}

/// Which Model Server Manager variant an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    Image,
    Text,
}

/// Whether a progress update reflects model loading or token/step
/// inference, per §4.3's phase heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Loading,
    Inference,
}

impl AppEvent {
    /// The topic this event is published on.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::QueueUpdated { .. } => Topic::QueueUpdates,
            Self::JobCompleted { .. } => Topic::QueueJobCompleted,
            Self::JobError { .. } => Topic::QueueJobError,
            Self::GenerationProgress { .. } => Topic::GenerationProgress,
            Self::GenerationComplete { .. } => Topic::GenerationComplete,
            Self::GenerationError { .. } => Topic::GenerationError,
            Self::LlmStreaming { .. } => Topic::LlmStreaming,
            Self::LlmComplete { .. } => Topic::LlmComplete,
            Self::LlmError { .. } => Topic::LlmError,
            Self::HardwareStats { .. } => Topic::HardwareStats,
            Self::LogLine { .. } => Topic::LogsStream,
            Self::ServerStatusChanged { .. } => Topic::ServerStatus,
            Self::ServerLogLine { .. } => Topic::ServerLogs,
        }
    }
}
