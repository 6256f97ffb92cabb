//! Graph Runtime (§4.5): executes a workflow DAG layer by layer against
//! the Model Server Managers, the CLI one-shot worker, and any
//! registered in-process transform nodes.

mod layering;
mod runtime;
mod worker;

pub use layering::topological_layers;
pub use runtime::{DEFAULT_UNLOAD_IDLE_AFTER, GraphRuntime};
pub use worker::{IMAGE_NODE_TYPE, TEXT_NODE_TYPE, VIDEO_NODE_TYPE, Workers};
