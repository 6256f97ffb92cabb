//! In-process transform node port.
//!
//! Per-node image/text algorithms are out of scope (§1), but the Graph
//! Runtime's dispatch contract must be total over every node `type` the
//! (out-of-scope) graph editor can emit. A node whose `type` names neither
//! the image server, the text server, nor the one-shot worker is routed to
//! a `TransformNode` registered under that type name at bootstrap. Concrete
//! transforms (crop, combine, passthrough, ...) are stubs here; this trait
//! is the named interface §4.5 asks for.

use std::collections::HashMap;

use async_trait::async_trait;

use super::GraphError;
use crate::domain::NodeOutput;

/// A synchronous, in-process node that needs no external OS process.
#[async_trait]
pub trait TransformNode: Send + Sync {
    /// The workflow node `type` string this transform handles.
    fn node_type(&self) -> &str;

    /// Compute this node's output from its already-materialized inputs.
    async fn run(
        &self,
        inputs: &HashMap<String, NodeOutput>,
        data: &serde_json::Value,
    ) -> Result<NodeOutput, GraphError>;
}
