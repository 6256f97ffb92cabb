//! Topological layering of a workflow DAG (§4.5 step 1): Kahn's algorithm
//! over the snapshot's order-preserving node map, so that nodes within a
//! layer come out in insertion order rather than an arbitrary one.

use std::collections::HashMap;

use indexmap::IndexSet;
use leaxer_core::domain::WorkflowSnapshot;

/// Group `snapshot`'s nodes into layers: every node in layer `i` depends
/// only on nodes in layers `< i`. Nodes within a layer appear in the same
/// relative order they have in `snapshot.nodes`.
#[must_use]
pub fn topological_layers(snapshot: &WorkflowSnapshot) -> Vec<Vec<String>> {
    let mut in_degree: HashMap<&str, u32> = snapshot.nodes.keys().map(|id| (id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for edge in &snapshot.edges {
        *in_degree.entry(edge.target_node_id.as_str()).or_insert(0) += 1;
        dependents
            .entry(edge.source_node_id.as_str())
            .or_default()
            .push(edge.target_node_id.as_str());
    }

    let mut remaining: IndexSet<&str> = snapshot.nodes.keys().map(String::as_str).collect();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
            .collect();

        if ready.is_empty() {
            // A cycle would have been rejected by `WorkflowSnapshot::validate`
            // before execution; treat any leftover nodes as a final layer
            // rather than looping forever.
            layers.push(remaining.iter().map(|s| (*s).to_string()).collect());
            break;
        }

        for id in &ready {
            remaining.shift_remove(id);
            if let Some(children) = dependents.get(id) {
                for child in children {
                    if let Some(count) = in_degree.get_mut(child) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }

        layers.push(ready.into_iter().map(str::to_string).collect());
    }

    layers
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use indexmap::IndexMap;
    use leaxer_core::domain::{ComputeBackend, Edge, ModelCachingStrategy, NodeSpec};

    use super::*;

    fn node() -> NodeSpec {
        NodeSpec {
            node_type: "Noop".to_string(),
            data: serde_json::Value::Null,
            inputs: HashMap::new(),
        }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            source_node_id: from.to_string(),
            source_port: "out".to_string(),
            target_node_id: to.to_string(),
            target_port: "in".to_string(),
        }
    }

    #[test]
    fn independent_nodes_land_in_one_layer_in_insertion_order() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node());
        nodes.insert("b".to_string(), node());
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: Vec::new(),
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::Auto,
        };

        let layers = topological_layers(&snapshot);
        assert_eq!(layers, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn a_chain_produces_one_layer_per_node() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node());
        nodes.insert("b".to_string(), node());
        nodes.insert("c".to_string(), node());
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: vec![edge("a", "b"), edge("b", "c")],
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::Auto,
        };

        let layers = topological_layers(&snapshot);
        assert_eq!(
            layers,
            vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]]
        );
    }

    #[test]
    fn a_diamond_groups_the_middle_nodes_together() {
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), node());
        nodes.insert("b".to_string(), node());
        nodes.insert("c".to_string(), node());
        nodes.insert("d".to_string(), node());
        let snapshot = WorkflowSnapshot {
            nodes,
            edges: vec![edge("a", "b"), edge("a", "c"), edge("b", "d"), edge("c", "d")],
            compute_backend: ComputeBackend::Cpu,
            model_caching_strategy: ModelCachingStrategy::Auto,
        };

        let layers = topological_layers(&snapshot);
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], vec!["a".to_string()]);
        assert_eq!(layers[2], vec!["d".to_string()]);
        let mut middle = layers[1].clone();
        middle.sort();
        assert_eq!(middle, vec!["b".to_string(), "c".to_string()]);
    }
}
