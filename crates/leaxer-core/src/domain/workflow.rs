//! Workflow snapshot domain types.
//!
//! A `WorkflowSnapshot` is the immutable unit the Job Queue accepts: a DAG
//! of typed nodes as submitted by the (out-of-scope) graph editor.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Execution target for a workflow's native inference calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeBackend {
    Cpu,
    Cuda,
    Metal,
    Directml,
}

/// Governs whether a model server is kept resident between jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCachingStrategy {
    Auto,
    KeepResident,
    UnloadAfter,
}

/// A single node in the workflow graph.
///
/// `data` and `inputs` are left as opaque JSON maps: the set of node types
/// (and their per-type shapes) is owned by the graph editor, which is out
/// of scope here. The runtime only needs to read `type` to pick a worker
/// and walk `inputs`/edges to resolve dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub inputs: HashMap<String, serde_json::Value>,
}

/// A directed edge between two node ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source_node_id: String,
    pub source_port: String,
    pub target_node_id: String,
    pub target_port: String,
}

/// Errors raised while validating a `WorkflowSnapshot`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("edge references unknown node: {0}")]
    DanglingEdge(String),

    #[error("graph contains a cycle involving node {0}")]
    Cycle(String),

    #[error("workflow has no nodes")]
    Empty,
}

/// Immutable record consumed by the Job Queue.
///
/// `nodes` is order-preserving (`IndexMap`, not `HashMap`): the Graph
/// Runtime executes same-layer nodes in insertion order (§4.5), which
/// only a deserialization-order-preserving map can give it without an
/// extra explicit ordering field in the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub nodes: IndexMap<String, NodeSpec>,
    pub edges: Vec<Edge>,
    pub compute_backend: ComputeBackend,
    pub model_caching_strategy: ModelCachingStrategy,
}

impl WorkflowSnapshot {
    /// Validate that every edge endpoint resolves to an existing node and
    /// that the graph is acyclic.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` on a dangling edge, a cycle, or an empty
    /// node set.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.nodes.is_empty() {
            return Err(ValidationError::Empty);
        }

        for edge in &self.edges {
            if !self.nodes.contains_key(&edge.source_node_id) {
                return Err(ValidationError::DanglingEdge(edge.source_node_id.clone()));
            }
            if !self.nodes.contains_key(&edge.target_node_id) {
                return Err(ValidationError::DanglingEdge(edge.target_node_id.clone()));
            }
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<(), ValidationError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            adjacency
                .entry(edge.source_node_id.as_str())
                .or_default()
                .push(edge.target_node_id.as_str());
        }

        let mut marks: HashMap<&str, Mark> = self
            .nodes
            .keys()
            .map(|id| (id.as_str(), Mark::Unvisited))
            .collect();

        fn visit<'a>(
            node: &'a str,
            adjacency: &HashMap<&'a str, Vec<&'a str>>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<(), ValidationError> {
            match marks.get(node) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::InProgress) => return Err(ValidationError::Cycle(node.to_string())),
                _ => {}
            }
            marks.insert(node, Mark::InProgress);
            if let Some(children) = adjacency.get(node) {
                for child in children {
                    visit(child, adjacency, marks)?;
                }
            }
            marks.insert(node, Mark::Done);
            Ok(())
        }

        let ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        for id in ids {
            visit(id, &adjacency, &mut marks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeSpec {
        NodeSpec {
            node_type: "Noop".to_string(),
            data: serde_json::Value::Null,
            inputs: HashMap::new(),
        }
    }

    #[test]
    fn rejects_dangling_edge() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node());
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: vec![Edge {
                source_node_id: "a".to_string(),
                source_port: "out".to_string(),
                target_node_id: "missing".to_string(),
                target_port: "in".to_string(),
            }],
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::Auto,
        };
        assert!(matches!(
            snapshot.validate(),
            Err(ValidationError::DanglingEdge(_))
        ));
    }

    #[test]
    fn rejects_cycle() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node());
        nodes.insert("b".to_string(), node());
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: vec![
                Edge {
                    source_node_id: "a".to_string(),
                    source_port: "out".to_string(),
                    target_node_id: "b".to_string(),
                    target_port: "in".to_string(),
                },
                Edge {
                    source_node_id: "b".to_string(),
                    source_port: "out".to_string(),
                    target_node_id: "a".to_string(),
                    target_port: "in".to_string(),
                },
            ],
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::Auto,
        };
        assert!(matches!(snapshot.validate(), Err(ValidationError::Cycle(_))));
    }

    #[test]
    fn accepts_valid_dag() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node());
        nodes.insert("b".to_string(), node());
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: vec![Edge {
                source_node_id: "a".to_string(),
                source_port: "out".to_string(),
                target_node_id: "b".to_string(),
                target_port: "in".to_string(),
            }],
            compute_backend: ComputeBackend::Cuda,
            model_caching_strategy: ModelCachingStrategy::KeepResident,
        };
        assert!(snapshot.validate().is_ok());
    }
}
