//! Serializable form of a compiled graph
//!
//! A [`GraphDocument`] is what gets handed to a backend adapter: the node
//! records plus name-based edges. Loading a document back validates it
//! before the arena is rebuilt.

use serde::{Deserialize, Serialize};

use crate::error::{PipecraftError, Result};
use crate::graph::Graph;
use crate::types::Node;
use crate::validation::validate_document;

/// An edge between two named nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEdge {
    /// Node that must finish first
    pub source: String,
    /// Node that waits for `source`
    pub target: String,
}

impl DocumentEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Nodes and edges of a compiled graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    /// Nodes in insertion order
    pub nodes: Vec<Node>,
    /// Edges in insertion order
    #[serde(default)]
    pub edges: Vec<DocumentEdge>,
}

impl Graph {
    /// Snapshot this graph as a document
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes().map(|(_, node)| node.clone()).collect(),
            edges: self
                .edge_names()
                .into_iter()
                .map(|(source, target)| DocumentEdge::new(source, target))
                .collect(),
        }
    }

    /// Serialize this graph as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Rebuild a graph from a document
    ///
    /// The document is validated first; the first problem found is returned.
    pub fn from_document(document: GraphDocument) -> Result<Self> {
        let errors = validate_document(&document);
        if let Some(first) = errors.into_iter().next() {
            return Err(PipecraftError::Validation(first));
        }

        let mut graph = Graph::new();
        for node in document.nodes {
            graph.add_node(node)?;
        }
        for edge in &document.edges {
            graph.connect(&edge.source, &edge.target)?;
        }
        log::debug!(
            "Loaded graph document with {} nodes and {} edges",
            graph.len(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Parse and validate a JSON graph document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: GraphDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{path_map, ContainerConfig, NodeType, PathMap, UnitOfWork};
    use crate::validation::ValidationError;

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        graph
            .add_node(
                Node::py_function(
                    "illum",
                    path_map([("images", ["raw/A01.tif"])]),
                    path_map([("illum", ["illum/A01.npy"])]),
                    None,
                )
                .unwrap(),
            )
            .unwrap();
        graph
            .add_node(
                Node::container(
                    "segment",
                    path_map([("illum", ["illum/A01.npy"])]),
                    path_map([("masks", ["seg/A01.tif"])]),
                    Some(ContainerConfig::new("cellprofiler:4.2.6").with_cmd(["-p", "seg.cppipe"])),
                )
                .unwrap(),
            )
            .unwrap();
        graph.connect("illum", "segment").unwrap();
        graph
    }

    #[test]
    fn test_document_roundtrip() {
        let graph = sample_graph();
        let json = graph.to_json_string().unwrap();
        let restored = Graph::from_json_str(&json).unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.edge_names(), vec![("illum", "segment")]);
        assert_eq!(
            restored.find("segment").map(|n| n.node_type()),
            Some(NodeType::Container)
        );
        assert_eq!(restored.to_document(), graph.to_document());
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(sample_graph().to_document()).unwrap();
        assert_eq!(value["edges"][0]["source"], "illum");
        assert_eq!(value["nodes"][1]["config"]["image"], "cellprofiler:4.2.6");
        assert_eq!(value["nodes"][1]["inputPaths"]["illum"][0], "illum/A01.npy");
    }

    #[test]
    fn test_from_document_rejects_cycle() {
        let mut document = sample_graph().to_document();
        document.edges.push(DocumentEdge::new("segment", "illum"));

        let err = Graph::from_document(document).unwrap_err();
        assert!(matches!(
            err,
            PipecraftError::Validation(ValidationError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_from_document_rejects_duplicates() {
        let mut document = sample_graph().to_document();
        document.nodes.push(
            Node::py_function("illum", PathMap::new(), PathMap::new(), None).unwrap(),
        );

        let err = Graph::from_document(document).unwrap_err();
        assert_eq!(err.node_name(), Some("illum"));
    }

    #[test]
    fn test_from_document_rejects_clash_with_par_container_child() {
        let par = Node::par_container(
            "x",
            vec![UnitOfWork::default(), UnitOfWork::default()],
            None,
        )
        .unwrap();
        let standalone = Node::container("x_0", PathMap::new(), PathMap::new(), None).unwrap();
        let document = GraphDocument {
            nodes: vec![par, standalone],
            edges: vec![DocumentEdge::new("x", "x_0")],
        };

        let err = Graph::from_document(document).unwrap_err();
        assert!(matches!(
            err,
            PipecraftError::Validation(ValidationError::DuplicateNodeName { ref node_id })
                if node_id == "x_0"
        ));
    }

    #[test]
    fn test_from_json_str_rejects_malformed() {
        assert!(matches!(
            Graph::from_json_str("{\"nodes\": 3}"),
            Err(PipecraftError::Serialization(_))
        ));
    }
}
