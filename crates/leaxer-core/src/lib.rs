//! Core domain types and port definitions for the Leaxer execution
//! substrate: the job queue, model-server lifecycle, process tracker, and
//! event bus that drive external AI inference binaries.

pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod settings;
pub mod utils;

// Re-export commonly used types for convenience
pub use domain::{
    ComputeBackend, Edge, ExecutionContext, ExecutionSnapshot, Job, JobStatus,
    ModelCachingStrategy, NodeOutput, NodeSpec, PendingRequest, ServerState, ServerStatus,
    StartupParams, StepProgress, TrackedProcess, ValidationError, WorkflowSnapshot,
};
pub use events::{AppEvent, GenerationPhase, ServerKind, Topic};
pub use paths::{PathError, data_root, pids_dir, queue_state_path};
pub use ports::{
    CoreError, EventBusPort, GenerationRequest, GenerationResult, GraphError,
    ModelServerPort, PersistedQueueState, ProcessError, ProcessTrackerPort, QueueError,
    QueueStorePort, ServerError, TransformNode,
};
pub use settings::{Settings, SettingsError, SettingsUpdate, validate_settings};
pub use utils::new_job_id;
