//! Chapter deltas and the merge that applies them.

use super::{Edge, EdgeChanges, Node, NodeChanges, Snapshot};
use serde::{Deserialize, Serialize};

/// Patch for one existing node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    pub id: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub changes: NodeChanges,
}

/// Patch for one existing edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeUpdate {
    pub id: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub changes: EdgeChanges,
}

/// How the graph changes over one chapter.
///
/// The six lists are independent; any of them may be missing on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub new_nodes: Vec<Node>,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub updated_nodes: Vec<NodeUpdate>,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub removed_node_ids: Vec<String>,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub new_edges: Vec<Edge>,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub updated_edges: Vec<EdgeUpdate>,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub removed_edge_ids: Vec<String>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when all six operation lists are empty.
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }

    /// Total number of operations across all lists.
    pub fn operation_count(&self) -> usize {
        self.new_nodes.len()
            + self.updated_nodes.len()
            + self.removed_node_ids.len()
            + self.new_edges.len()
            + self.updated_edges.len()
            + self.removed_edge_ids.len()
    }

    pub fn add_node(mut self, node: Node) -> Self {
        self.new_nodes.push(node);
        self
    }

    pub fn update_node(mut self, id: impl Into<String>, changes: NodeChanges) -> Self {
        self.updated_nodes.push(NodeUpdate {
            id: id.into(),
            changes,
        });
        self
    }

    pub fn remove_node(mut self, id: impl Into<String>) -> Self {
        self.removed_node_ids.push(id.into());
        self
    }

    pub fn add_edge(mut self, edge: Edge) -> Self {
        self.new_edges.push(edge);
        self
    }

    pub fn update_edge(mut self, id: impl Into<String>, changes: EdgeChanges) -> Self {
        self.updated_edges.push(EdgeUpdate {
            id: id.into(),
            changes,
        });
        self
    }

    pub fn remove_edge(mut self, id: impl Into<String>) -> Self {
        self.removed_edge_ids.push(id.into());
        self
    }
}

/// Apply a delta to a snapshot, producing a new snapshot.
///
/// Nodes are processed before edges; within each, additions, then updates,
/// then removals:
///
/// 1. additions are skipped when the id already exists;
/// 2. updates shallow-merge onto the entry with the same id, and edge `events`
///    are appended rather than replaced;
/// 3. removals drop the entry with the same id.
///
/// Unknown ids in updates and removals are ignored. `snapshot` is not modified.
pub fn apply(snapshot: &Snapshot, delta: &Delta) -> Snapshot {
    let mut nodes = snapshot.nodes.clone();
    let mut edges = snapshot.edges.clone();

    for node in &delta.new_nodes {
        if !nodes.iter().any(|n| n.id == node.id) {
            nodes.push(node.clone());
        }
    }

    for update in &delta.updated_nodes {
        if let Some(node) = nodes.iter_mut().find(|n| n.id == update.id) {
            node.apply_changes(&update.changes);
        }
    }

    for id in &delta.removed_node_ids {
        if let Some(pos) = nodes.iter().position(|n| &n.id == id) {
            nodes.remove(pos);
        }
    }

    for (index, edge) in delta.new_edges.iter().enumerate() {
        let mut edge = edge.clone();
        edge.ensure_id(index);
        if !edges.iter().any(|e| e.id == edge.id) {
            edges.push(edge);
        }
    }

    for update in &delta.updated_edges {
        if let Some(edge) = edges.iter_mut().find(|e| e.id == update.id) {
            edge.apply_changes(&update.changes);
        }
    }

    for id in &delta.removed_edge_ids {
        if let Some(pos) = edges.iter().position(|e| &e.id == id) {
            edges.remove(pos);
        }
    }

    Snapshot { nodes, edges }
}
