//! Node handler registry for backend dispatch
//!
//! Backends consume a compiled [`Graph`] by walking it in topological order
//! and handing each node to the handler registered for its [`NodeType`].
//! The registry replaces a hardcoded match on node types with an extensible
//! mapping that backend adapters fill in.
//!
//! # Usage
//!
//! ```ignore
//! let mut registry = DispatchRegistry::new();
//! registry.register_fn(NodeType::Container, |node| submit_job(node));
//! registry.dispatch(&graph)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PipecraftError, Result};
use crate::graph::Graph;
use crate::types::{Node, NodeType};

/// Handles every node of one type
pub trait NodeHandler: Send + Sync {
    /// Handle a single node
    fn handle(&self, node: &Node) -> Result<()>;
}

/// Synchronous callback-based NodeHandler
pub struct FnNodeHandler {
    callback: Box<dyn Fn(&Node) -> Result<()> + Send + Sync>,
}

impl FnNodeHandler {
    pub fn new(callback: impl Fn(&Node) -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl NodeHandler for FnNodeHandler {
    fn handle(&self, node: &Node) -> Result<()> {
        (self.callback)(node)
    }
}

/// Registry mapping node types to handlers
///
/// Registries can be composed by merging; entries from the merged registry
/// win on conflicts.
pub struct DispatchRegistry {
    handlers: HashMap<NodeType, Arc<dyn NodeHandler>>,
}

impl DispatchRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a node type
    pub fn register(&mut self, node_type: NodeType, handler: Arc<dyn NodeHandler>) {
        self.handlers.insert(node_type, handler);
    }

    /// Register a closure for a node type
    pub fn register_fn(
        &mut self,
        node_type: NodeType,
        callback: impl Fn(&Node) -> Result<()> + Send + Sync + 'static,
    ) {
        self.register(node_type, Arc::new(FnNodeHandler::new(callback)));
    }

    /// Get the handler for a node type
    pub fn get(&self, node_type: NodeType) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(&node_type).cloned()
    }

    /// Check if a node type has a handler
    pub fn has_handler(&self, node_type: NodeType) -> bool {
        self.handlers.contains_key(&node_type)
    }

    /// List node types with a handler, sorted
    pub fn node_types(&self) -> Vec<NodeType> {
        let mut types: Vec<NodeType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    /// Merge another registry into this one
    pub fn merge(&mut self, other: DispatchRegistry) {
        self.handlers.extend(other.handlers);
    }

    /// Walk `graph` in topological order and hand each node to its handler
    ///
    /// Scatter/Gather nodes without a handler are skipped. A ParContainer
    /// without its own handler dispatches its containers to the Container
    /// handler. Returns the number of handler calls.
    pub fn dispatch(&self, graph: &Graph) -> Result<usize> {
        let mut calls = 0;
        for index in graph.topological_order()? {
            let Some(node) = graph.node(index) else {
                continue;
            };
            calls += self.dispatch_node(node)?;
        }
        log::debug!("Dispatched {} nodes", calls);
        Ok(calls)
    }

    fn dispatch_node(&self, node: &Node) -> Result<usize> {
        let node_type = node.node_type();
        if let Some(handler) = self.handlers.get(&node_type) {
            handler.handle(node)?;
            return Ok(1);
        }
        match node_type {
            NodeType::Scatter | NodeType::Gather => Ok(0),
            NodeType::ParContainer => node
                .containers()
                .iter()
                .map(|container| self.dispatch_node(container))
                .sum(),
            _ => Err(PipecraftError::dispatch(
                node.name(),
                format!("no handler registered for {}", node_type),
            )),
        }
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Runnable nodes of a graph grouped by how a backend invokes them
///
/// Each list keeps topological order. ParContainer records are expanded
/// into their containers.
#[derive(Debug, Default)]
pub struct DispatchPlan<'g> {
    pub containers: Vec<&'g Node>,
    pub py_functions: Vec<&'g Node>,
    pub invoke_shells: Vec<&'g Node>,
    /// Scatter/Gather nodes, which need no invocation
    pub boundaries: usize,
}

impl<'g> DispatchPlan<'g> {
    /// Partition the nodes of `graph`
    pub fn from_graph(graph: &'g Graph) -> Result<Self> {
        let mut plan = Self::default();
        for index in graph.topological_order()? {
            if let Some(node) = graph.node(index) {
                plan.push(node);
            }
        }
        Ok(plan)
    }

    fn push(&mut self, node: &'g Node) {
        match node.node_type() {
            NodeType::Container => self.containers.push(node),
            NodeType::ParContainer => self.containers.extend(node.containers()),
            NodeType::PyFunction => self.py_functions.push(node),
            NodeType::InvokeShell => self.invoke_shells.push(node),
            NodeType::Scatter | NodeType::Gather => self.boundaries += 1,
        }
    }

    /// Total number of invocations
    pub fn len(&self) -> usize {
        self.containers.len() + self.py_functions.len() + self.invoke_shells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::document::{DocumentEdge, GraphDocument};
    use crate::pipeline::{Pipeline, Step};
    use crate::types::{ContainerConfig, InvokeShellConfig, PathMap, UnitOfWork};

    fn pf(name: &str) -> Node {
        Node::py_function(name, PathMap::new(), PathMap::new(), None).unwrap()
    }

    fn container(name: &str) -> Node {
        Node::container(name, PathMap::new(), PathMap::new(), None).unwrap()
    }

    fn sample() -> Graph {
        Pipeline::seq([
            Step::from(pf("illum")),
            Pipeline::parallel([container("seg_a"), container("seg_b")]).into(),
            Step::from(
                Node::invoke_shell(
                    "stitch",
                    PathMap::new(),
                    PathMap::new(),
                    InvokeShellConfig::new("fiji --headless"),
                )
                .unwrap(),
            ),
        ])
        .compile()
        .unwrap()
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>) -> impl Fn(&Node) -> Result<()> + Send + Sync {
        let log = Arc::clone(log);
        move |node: &Node| {
            log.lock().unwrap().push(node.name().to_string());
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_in_topological_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DispatchRegistry::new();
        registry.register_fn(NodeType::PyFunction, recorder(&seen));
        registry.register_fn(NodeType::Container, recorder(&seen));
        registry.register_fn(NodeType::InvokeShell, recorder(&seen));

        let calls = registry.dispatch(&sample()).unwrap();
        assert_eq!(calls, 4);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["illum", "seg_a", "seg_b", "stitch"]
        );
    }

    #[test]
    fn test_missing_handler_is_error() {
        let mut registry = DispatchRegistry::new();
        registry.register_fn(NodeType::PyFunction, |_| Ok(()));

        let err = registry.dispatch(&sample()).unwrap_err();
        assert!(matches!(err, PipecraftError::Dispatch { ref node, .. } if node == "seg_a"));
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut registry = DispatchRegistry::new();
        registry.register_fn(NodeType::PyFunction, |node| {
            Err(PipecraftError::dispatch(node.name(), "venv missing"))
        });
        let err = registry.dispatch(&sample()).unwrap_err();
        assert_eq!(err.node_name(), Some("illum"));
    }

    #[test]
    fn test_par_container_record_dispatches_children() {
        let par = Node::par_container(
            "x",
            vec![UnitOfWork::default(), UnitOfWork::default()],
            Some(ContainerConfig::new("cp:4")),
        )
        .unwrap();
        // Hand-written documents may carry the ParContainer record itself
        let graph = Graph::from_document(GraphDocument {
            nodes: vec![pf("a"), par],
            edges: vec![DocumentEdge::new("a", "x")],
        })
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DispatchRegistry::new();
        registry.register_fn(NodeType::PyFunction, recorder(&seen));
        registry.register_fn(NodeType::Container, recorder(&seen));
        assert_eq!(registry.dispatch(&graph).unwrap(), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "x_0", "x_1"]);

        let plan = DispatchPlan::from_graph(&graph).unwrap();
        let names: Vec<&str> = plan.containers.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["x_0", "x_1"]);
    }

    #[test]
    fn test_dispatch_plan() {
        let graph = sample();
        let plan = DispatchPlan::from_graph(&graph).unwrap();
        assert_eq!(plan.py_functions.len(), 1);
        assert_eq!(plan.containers.len(), 2);
        assert_eq!(plan.invoke_shells.len(), 1);
        assert_eq!(plan.boundaries, 2);
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_merge_and_node_types() {
        let mut registry = DispatchRegistry::new();
        registry.register_fn(NodeType::PyFunction, |_| Ok(()));
        let mut other = DispatchRegistry::default();
        other.register_fn(NodeType::Container, |_| Ok(()));
        registry.merge(other);

        assert!(registry.has_handler(NodeType::Container));
        assert!(registry.get(NodeType::InvokeShell).is_none());
        assert_eq!(
            registry.node_types(),
            vec![NodeType::PyFunction, NodeType::Container]
        );
    }

    #[test]
    fn test_empty_graph() {
        let registry = DispatchRegistry::new();
        assert_eq!(registry.dispatch(&Graph::new()).unwrap(), 0);
        assert!(DispatchPlan::from_graph(&Graph::new()).unwrap().is_empty());
    }
}
