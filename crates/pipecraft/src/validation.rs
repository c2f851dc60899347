//! Structural validation for graph documents
//!
//! Validates node configurations, name uniqueness, edge references, and
//! detects cycles before a document is turned back into a [`Graph`].
//!
//! [`Graph`]: crate::graph::Graph

use std::collections::{HashMap, HashSet, VecDeque};

use crate::document::GraphDocument;

/// Validation error with location context
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Cycle detected in the graph
    CycleDetected { nodes: Vec<String> },
    /// Two nodes share a name
    DuplicateNodeName { node_id: String },
    /// An edge references a non-existent node
    UnknownNode {
        source: String,
        target: String,
        node_id: String,
    },
    /// An edge connects a node to itself
    SelfLoop { node_id: String },
    /// A node carries an invalid configuration
    InvalidNode { node_id: String, reason: String },
}

impl ValidationError {
    /// Name of the offending node
    pub fn node_name(&self) -> Option<&str> {
        match self {
            Self::CycleDetected { nodes } => nodes.first().map(String::as_str),
            Self::DuplicateNodeName { node_id }
            | Self::UnknownNode { node_id, .. }
            | Self::SelfLoop { node_id }
            | Self::InvalidNode { node_id, .. } => Some(node_id),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected { nodes } => {
                write!(f, "Cycle detected in graph involving: {}", nodes.join(", "))
            }
            Self::DuplicateNodeName { node_id } => {
                write!(f, "Node name '{}' is used more than once", node_id)
            }
            Self::UnknownNode {
                source,
                target,
                node_id,
            } => {
                write!(
                    f,
                    "Edge '{}' -> '{}' references unknown node '{}'",
                    source, target, node_id
                )
            }
            Self::SelfLoop { node_id } => write!(f, "Node '{}' depends on itself", node_id),
            Self::InvalidNode { node_id, reason } => {
                write!(f, "Node '{}' is invalid: {}", node_id, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a graph document
///
/// Returns all validation errors found (not just the first).
pub fn validate_document(document: &GraphDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_nodes(document, &mut errors);
    validate_unique_names(document, &mut errors);
    validate_edge_references(document, &mut errors);
    detect_cycles(document, &mut errors);

    errors
}

/// Check every node's own configuration
fn validate_nodes(document: &GraphDocument, errors: &mut Vec<ValidationError>) {
    for node in &document.nodes {
        if let Err(err) = node.validate() {
            errors.push(ValidationError::InvalidNode {
                node_id: node.name().to_string(),
                reason: err.to_string(),
            });
        }
    }
}

/// Check name uniqueness, including the containers a ParContainer owns
fn validate_unique_names(document: &GraphDocument, errors: &mut Vec<ValidationError>) {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();
    let names = document
        .nodes
        .iter()
        .flat_map(|node| std::iter::once(node).chain(node.containers()))
        .map(|node| node.name());
    for name in names {
        if !seen.insert(name) && reported.insert(name) {
            errors.push(ValidationError::DuplicateNodeName {
                node_id: name.to_string(),
            });
        }
    }
}

/// Check that all edge source/target nodes exist
fn validate_edge_references(document: &GraphDocument, errors: &mut Vec<ValidationError>) {
    let names: HashSet<&str> = document.nodes.iter().map(|n| n.name()).collect();

    for edge in &document.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !names.contains(endpoint.as_str()) {
                errors.push(ValidationError::UnknownNode {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
        if edge.source == edge.target {
            errors.push(ValidationError::SelfLoop {
                node_id: edge.source.clone(),
            });
        }
    }
}

/// Detect cycles using Kahn's algorithm (topological sort)
///
/// Edges with an unknown endpoint are left to [`validate_edge_references`].
fn detect_cycles(document: &GraphDocument, errors: &mut Vec<ValidationError>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in &document.nodes {
        in_degree.insert(node.name(), 0);
    }
    // Duplicate edges count once, matching how the graph stores them
    let edges: HashSet<(&str, &str)> = document
        .edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .filter(|(source, target)| in_degree.contains_key(source) && in_degree.contains_key(target))
        .collect();

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for &(source, target) in &edges {
        adjacency.entry(source).or_default().push(target);
        if let Some(deg) = in_degree.get_mut(target) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for &target in adjacency.get(node_id).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(deg) = in_degree.get_mut(target) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    if visited < in_degree.len() {
        let mut nodes: Vec<String> = in_degree
            .iter()
            .filter(|(_, &deg)| deg > 0)
            .map(|(&id, _)| id.to_string())
            .collect();
        nodes.sort();
        errors.push(ValidationError::CycleDetected { nodes });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentEdge;
    use crate::types::{Node, PathMap, UnitOfWork};

    fn node(name: &str) -> Node {
        Node::py_function(name, PathMap::new(), PathMap::new(), None).unwrap()
    }

    fn document(names: &[&str], edges: &[(&str, &str)]) -> GraphDocument {
        GraphDocument {
            nodes: names.iter().map(|n| node(n)).collect(),
            edges: edges
                .iter()
                .map(|(s, t)| DocumentEdge::new(*s, *t))
                .collect(),
        }
    }

    #[test]
    fn test_valid_document() {
        let doc = document(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let errors = validate_document(&doc);
        assert!(errors.is_empty(), "Expected no errors, got: {:?}", errors);
    }

    #[test]
    fn test_detect_cycle() {
        let doc = document(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "b")]);
        let errors = validate_document(&doc);
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::CycleDetected { nodes } if nodes == &["b", "c"]
        )));
    }

    #[test]
    fn test_duplicate_edges_are_not_a_cycle() {
        let doc = document(&["a", "b"], &[("a", "b"), ("a", "b")]);
        assert!(validate_document(&doc).is_empty());
    }

    #[test]
    fn test_duplicate_names() {
        let doc = document(&["a", "a", "a"], &[]);
        let errors = validate_document(&doc);
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateNodeName {
                node_id: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_edge_references_missing_node() {
        let doc = document(&["a"], &[("a", "missing")]);
        let errors = validate_document(&doc);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownNode { node_id, .. } if node_id == "missing")));
    }

    #[test]
    fn test_unknown_source_is_not_a_cycle() {
        let doc = document(&["a", "b"], &[("ghost", "b"), ("a", "b")]);
        let errors = validate_document(&doc);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::UnknownNode { node_id, .. } if node_id == "ghost"
        ));
    }

    #[test]
    fn test_par_container_children_share_the_namespace() {
        let par = Node::par_container(
            "x",
            vec![UnitOfWork::default(), UnitOfWork::default()],
            None,
        )
        .unwrap();
        let doc = GraphDocument {
            nodes: vec![par, node("x_0")],
            edges: vec![DocumentEdge::new("x", "x_0")],
        };
        assert_eq!(
            validate_document(&doc),
            vec![ValidationError::DuplicateNodeName {
                node_id: "x_0".to_string()
            }]
        );
    }

    #[test]
    fn test_self_loop() {
        let doc = document(&["a"], &[("a", "a")]);
        let errors = validate_document(&doc);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::SelfLoop { .. })));
    }

    #[test]
    fn test_invalid_node_config() {
        let json = serde_json::json!({
            "nodes": [{
                "name": "seg",
                "config": { "type": "container", "image": "" }
            }],
            "edges": []
        });
        let doc: GraphDocument = serde_json::from_value(json).unwrap();
        let errors = validate_document(&doc);
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::InvalidNode { node_id, .. }] if node_id == "seg"
        ));
    }

    #[test]
    fn test_collects_multiple_errors() {
        let doc = document(&["a", "b", "b"], &[("a", "b"), ("b", "a"), ("a", "zzz")]);
        let errors = validate_document(&doc);
        // Duplicate name, unknown node and cycle
        assert!(errors.len() >= 3);
    }
}
