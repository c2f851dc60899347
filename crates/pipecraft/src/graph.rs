//! Compiled dependency graph
//!
//! Nodes live in an arena keyed by an opaque [`NodeIndex`]. Node names are a
//! separate label, checked for uniqueness when a node enters the arena.
//! Edges mean "must happen before" and carry no other semantics.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::{PipecraftError, Result};
use crate::types::{Node, NodeType};

/// Opaque handle to a node inside one [`Graph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Position of the node in insertion order
    pub fn index(self) -> usize {
        self.0
    }
}

/// A "must-happen-before" edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: NodeIndex,
    pub target: NodeIndex,
}

/// Directed acyclic graph produced by compiling a pipeline
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeIndex>,
    edges: Vec<Edge>,
    edge_set: HashSet<Edge>,
    outgoing: Vec<Vec<NodeIndex>>,
    incoming: Vec<Vec<NodeIndex>>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, rejecting a name already present in the graph
    pub fn add_node(&mut self, node: Node) -> Result<NodeIndex> {
        if self.by_name.contains_key(node.name()) {
            return Err(PipecraftError::DuplicateNodeName(node.name().to_string()));
        }
        let index = NodeIndex(self.nodes.len());
        self.by_name.insert(node.name().to_string(), index);
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        Ok(index)
    }

    /// Add an edge `source -> target`
    ///
    /// Returns `false` if the edge was already present.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex) -> Result<bool> {
        for index in [source, target] {
            if index.0 >= self.nodes.len() {
                return Err(PipecraftError::UnknownNode(format!("#{}", index.0)));
            }
        }
        if source == target {
            return Err(PipecraftError::CyclicGraph {
                nodes: vec![self.nodes[source.0].name().to_string()],
            });
        }
        let edge = Edge { source, target };
        if !self.edge_set.insert(edge) {
            return Ok(false);
        }
        log::debug!(
            "edge {} -> {}",
            self.nodes[source.0].name(),
            self.nodes[target.0].name()
        );
        self.edges.push(edge);
        self.outgoing[source.0].push(target);
        self.incoming[target.0].push(source);
        Ok(true)
    }

    /// Add an edge between two nodes identified by name
    pub fn connect(&mut self, source: &str, target: &str) -> Result<bool> {
        let source = self.require(source)?;
        let target = self.require(target)?;
        self.add_edge(source, target)
    }

    fn require(&self, name: &str) -> Result<NodeIndex> {
        self.index_of(name)
            .ok_or_else(|| PipecraftError::UnknownNode(name.to_string()))
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get a node by index
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index.0)
    }

    /// Find a node by name
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.index_of(name).and_then(|index| self.node(index))
    }

    /// Look up the index of a named node
    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.by_name.get(name).copied()
    }

    /// Iterate nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i), node))
    }

    /// Edges in insertion order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges as `(source name, target name)` pairs
    pub fn edge_names(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .map(|e| (self.nodes[e.source.0].name(), self.nodes[e.target.0].name()))
            .collect()
    }

    /// Check whether the edge `source -> target` exists
    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        match (self.index_of(source), self.index_of(target)) {
            (Some(source), Some(target)) => self.edge_set.contains(&Edge { source, target }),
            _ => false,
        }
    }

    /// Direct downstream nodes
    pub fn successors(&self, index: NodeIndex) -> &[NodeIndex] {
        self.outgoing.get(index.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct upstream nodes
    pub fn predecessors(&self, index: NodeIndex) -> &[NodeIndex] {
        self.incoming.get(index.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get the names of nodes that this node depends on (upstream nodes)
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|index| self.names(self.predecessors(index)))
            .unwrap_or_default()
    }

    /// Get the names of nodes that depend on this node (downstream nodes)
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|index| self.names(self.successors(index)))
            .unwrap_or_default()
    }

    fn names(&self, indices: &[NodeIndex]) -> Vec<&str> {
        indices.iter().map(|i| self.nodes[i.0].name()).collect()
    }

    /// Nodes without incoming edges
    pub fn roots(&self) -> Vec<NodeIndex> {
        (0..self.nodes.len())
            .filter(|&i| self.incoming[i].is_empty())
            .map(NodeIndex)
            .collect()
    }

    /// Nodes without outgoing edges
    pub fn leaves(&self) -> Vec<NodeIndex> {
        (0..self.nodes.len())
            .filter(|&i| self.outgoing[i].is_empty())
            .map(NodeIndex)
            .collect()
    }

    /// Nodes of one variant, in insertion order
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(move |node| node.node_type() == node_type)
    }

    /// Topological order using Kahn's algorithm
    ///
    /// Among ready nodes the earliest inserted goes first, so the order is
    /// stable for a given graph.
    pub fn topological_order(&self) -> Result<Vec<NodeIndex>> {
        let mut in_degree: Vec<usize> = self.incoming.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<NodeIndex>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| Reverse(NodeIndex(i)))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(index);
            for &next in &self.outgoing[index.0] {
                in_degree[next.0] -= 1;
                if in_degree[next.0] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < self.nodes.len() {
            let nodes = in_degree
                .iter()
                .enumerate()
                .filter(|(_, &deg)| deg > 0)
                .map(|(i, _)| self.nodes[i].name().to_string())
                .collect();
            return Err(PipecraftError::CyclicGraph { nodes });
        }
        Ok(order)
    }

    pub fn is_acyclic(&self) -> bool {
        self.topological_order().is_ok()
    }
}
