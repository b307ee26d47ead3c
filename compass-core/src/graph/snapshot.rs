//! Fully materialized graph state.

use super::{Edge, Node};
use serde::{Deserialize, Serialize};

/// A complete graph as of one chapter.
///
/// Nodes and edges keep insertion order and are unique by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub nodes: Vec<Node>,

    #[serde(default, deserialize_with = "super::null_as_default")]
    pub edges: Vec<Edge>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from raw lists, keeping the first entry for each id.
    ///
    /// Edges without an id get `edge_{source}_{target}_{index}`, where `index`
    /// is the position in `edges`.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut snapshot = Self::new();
        for node in nodes {
            if !snapshot.contains_node(&node.id) {
                snapshot.nodes.push(node);
            }
        }
        for (index, mut edge) in edges.into_iter().enumerate() {
            edge.ensure_id(index);
            if !snapshot.contains_edge(&edge.id) {
                snapshot.edges.push(edge);
            }
        }
        snapshot
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edge(id).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges touching a node, in insertion order.
    pub fn edges_of<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(node_id))
    }

    /// Edges whose source or target is not a node of this snapshot.
    ///
    /// These are tolerated; this is for reporting only.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| !self.contains_node(&e.source) || !self.contains_node(&e.target))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RelationType;

    #[test]
    fn test_from_parts_dedupes_and_assigns_ids() {
        let snapshot = Snapshot::from_parts(
            vec![
                Node::character("a", "Ann"),
                Node::character("b", "Bo"),
                Node::character("a", "Ann again"),
            ],
            vec![
                Edge::new("", "a", "b", RelationType::Family),
                Edge::new("", "b", "a", RelationType::Hostile),
            ],
        );

        assert_eq!(snapshot.node_count(), 2);
        assert_eq!(snapshot.node("a").unwrap().label, "Ann");
        assert_eq!(snapshot.edges[0].id, "edge_a_b_0");
        assert_eq!(snapshot.edges[1].id, "edge_b_a_1");
    }

    #[test]
    fn test_edges_of_and_dangling() {
        let snapshot = Snapshot::from_parts(
            vec![Node::character("a", "Ann"), Node::character("b", "Bo")],
            vec![
                Edge::new("e1", "a", "b", RelationType::Alliance),
                Edge::new("e2", "a", "ghost", RelationType::Hostile),
            ],
        );

        assert_eq!(snapshot.edges_of("a").count(), 2);
        assert_eq!(snapshot.edges_of("b").count(), 1);

        let dangling = snapshot.dangling_edges();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].id, "e2");
    }
}
