//! Core domain types: pure data, no I/O.

pub mod execution;
pub mod job;
pub mod process;
pub mod server;
pub mod workflow;

pub use execution::{ExecutionContext, ExecutionSnapshot, NodeOutput, StepProgress};
pub use job::{Job, JobStatus};
pub use process::TrackedProcess;
pub use server::{PendingRequest, ServerState, ServerStatus, StartupParams};
pub use workflow::{ComputeBackend, Edge, ModelCachingStrategy, NodeSpec, ValidationError, WorkflowSnapshot};
