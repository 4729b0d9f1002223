//! Graph helpers and integrity checks over [`Workflow`].
//!
//! Rules enforced by [`check_integrity`]:
//! 1. Node IDs must be unique within the workflow.
//! 2. Edge IDs must be unique within the workflow.
//! 3. Every edge must reference valid node IDs (both `source` and `target`).
//!
//! Cycles are allowed; the executor guards against revisiting nodes.

use std::collections::HashSet;

use crate::models::{Edge, Node, Workflow};
use crate::GraphError;

impl Workflow {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node_by_id(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn node_by_id_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == node_id)
    }

    pub fn edge_by_id(&self, edge_id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == edge_id)
    }

    /// Every trigger-kind node, in node order.
    pub fn trigger_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_trigger())
    }

    /// The entry point: the first trigger in node order.
    pub fn find_trigger_node(&self) -> Option<&Node> {
        self.trigger_nodes().next()
    }

    /// Targets of every edge leaving `node_id`, in edge order.
    pub fn next_nodes(&self, node_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.source == node_id)
            .map(|e| e.target.as_str())
            .collect()
    }
}

/// Collect every integrity violation in the workflow (empty when sound).
pub fn check_integrity(workflow: &Workflow) -> Vec<GraphError> {
    let mut errors = Vec::new();

    // -----------------------------------------------------------------------
    // 1. Ensure node IDs are unique
    // -----------------------------------------------------------------------
    let mut seen_nodes: HashSet<&str> = HashSet::new();
    for node in &workflow.nodes {
        if !seen_nodes.insert(node.id.as_str()) {
            errors.push(GraphError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Ensure edge IDs are unique
    // -----------------------------------------------------------------------
    let mut seen_edges: HashSet<&str> = HashSet::new();
    for edge in &workflow.edges {
        if !seen_edges.insert(edge.id.as_str()) {
            errors.push(GraphError::DuplicateEdgeId(edge.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 3. Validate edge endpoints
    // -----------------------------------------------------------------------
    for edge in &workflow.edges {
        if !seen_nodes.contains(edge.source.as_str()) {
            errors.push(GraphError::UnknownNodeReference {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !seen_nodes.contains(edge.target.as_str()) {
            errors.push(GraphError::UnknownNodeReference {
                edge_id: edge.id.clone(),
                node_id: edge.target.clone(),
                side: "target",
            });
        }
    }

    errors
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use nodes::NodeType;

    fn make_node(id: &str) -> Node {
        Node::of_type(id, NodeType::Http)
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge::new(id, source, target)
    }

    #[test]
    fn next_nodes_follow_edge_order() {
        //   A
        //  / \
        // C   B   (edge to C defined first)
        let workflow = Workflow::new(
            vec![make_node("a"), make_node("b"), make_node("c")],
            vec![edge("e1", "a", "c"), edge("e2", "a", "b")],
        );

        assert_eq!(workflow.next_nodes("a"), vec!["c", "b"]);
        assert!(workflow.next_nodes("b").is_empty());
    }

    #[test]
    fn first_trigger_in_node_order_wins() {
        let workflow = Workflow::new(
            vec![
                make_node("x"),
                Node::of_type("hook", NodeType::Webhook),
                Node::of_type("manual", NodeType::Manual),
            ],
            vec![],
        );

        assert_eq!(workflow.find_trigger_node().map(|n| n.id.as_str()), Some("hook"));
        assert_eq!(workflow.trigger_nodes().count(), 2);
    }

    #[test]
    fn no_trigger_is_none() {
        let workflow = Workflow::new(vec![make_node("a")], vec![]);
        assert!(workflow.find_trigger_node().is_none());
    }

    #[test]
    fn sound_diamond_with_cycle_has_no_integrity_errors() {
        //   A
        //  / \
        // B   C
        //  \ /
        //   D ──► A
        let workflow = Workflow::new(
            vec![make_node("a"), make_node("b"), make_node("c"), make_node("d")],
            vec![
                edge("e1", "a", "b"),
                edge("e2", "a", "c"),
                edge("e3", "b", "d"),
                edge("e4", "c", "d"),
                edge("e5", "d", "a"),
            ],
        );

        assert!(check_integrity(&workflow).is_empty());
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let workflow = Workflow::new(
            vec![make_node("a"), make_node("a")], // duplicate!
            vec![edge("e", "a", "a"), edge("e", "a", "a")],
        );

        let errors = check_integrity(&workflow);
        assert!(errors.contains(&GraphError::DuplicateNodeId("a".into())));
        assert!(errors.contains(&GraphError::DuplicateEdgeId("e".into())));
    }

    #[test]
    fn dangling_edge_is_reported_per_side() {
        let workflow = Workflow::new(
            vec![make_node("a")],
            vec![edge("e1", "a", "ghost"), edge("e2", "phantom", "a")],
        );

        let errors = check_integrity(&workflow);
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            &errors[0],
            GraphError::UnknownNodeReference { node_id, side: "target", .. } if node_id == "ghost"
        ));
        assert!(matches!(
            &errors[1],
            GraphError::UnknownNodeReference { node_id, side: "source", .. } if node_id == "phantom"
        ));
    }
}
