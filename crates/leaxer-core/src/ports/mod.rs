//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the core domain expects from infrastructure
//! (`leaxer-runtime`'s adapters). They contain no implementation details
//! and use only domain types.

pub mod errors;
pub mod event_bus;
pub mod model_server;
pub mod process_tracker;
pub mod queue_store;
pub mod transform;

pub use errors::{CoreError, GraphError, ProcessError, QueueError, ServerError};
pub use event_bus::EventBusPort;
pub use model_server::{GenerationRequest, GenerationResult, ModelServerPort};
pub use process_tracker::ProcessTrackerPort;
pub use queue_store::{PersistedQueueState, QueueStorePort};
pub use transform::TransformNode;
