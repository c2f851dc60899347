//! Pipeline composition and compilation
//!
//! A [`Pipeline`] is a composition expression over nodes and nested
//! pipelines. `Seq` chains its children so each one must finish before the
//! next starts. `Parallel` wraps its children between a synthetic Scatter
//! and Gather node and adds no edges between siblings.
//!
//! # Example
//!
//! ```ignore
//! let pipe = Pipeline::seq([
//!     Step::from(a),
//!     Pipeline::parallel([b, c]).into(),
//!     Step::from(d),
//! ]);
//! let graph = pipe.compile()?;
//! // a -> Scatter -> {b, c} -> Gather -> d
//! ```
//!
//! Compilation is pure: every call builds a fresh [`Graph`].

use std::fmt;

use crate::config::CompileOptions;
use crate::error::{PipecraftError, Result};
use crate::graph::{Graph, NodeIndex};
use crate::naming::BoundaryNaming;
use crate::types::{Node, NodeName, NodeType};

/// Composition strategy of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Composition {
    /// Children run one after another
    Seq,
    /// Children run concurrently between Scatter and Gather
    Parallel,
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Composition::Seq => f.write_str("Seq"),
            Composition::Parallel => f.write_str("Parallel"),
        }
    }
}

/// One child of a pipeline
#[derive(Debug, Clone)]
pub enum Step {
    Node(Node),
    Pipeline(Pipeline),
}

impl From<Node> for Step {
    fn from(node: Node) -> Self {
        Step::Node(node)
    }
}

impl From<Pipeline> for Step {
    fn from(pipeline: Pipeline) -> Self {
        Step::Pipeline(pipeline)
    }
}

/// Resolved shape of a pipeline, mirroring its nesting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A single node
    Leaf(NodeName),
    /// A nested pipeline's own resolved list
    Nested(Vec<Resolved>),
}

impl Resolved {
    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Resolved::Leaf(name) => out.push(name),
            Resolved::Nested(items) => items.iter().for_each(|item| item.flatten_into(out)),
        }
    }
}

/// Entry and exit nodes of a step after it has been merged into a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub entry: NodeIndex,
    pub exit: NodeIndex,
}

/// A composition expression over nodes and nested pipelines
#[derive(Debug, Clone)]
pub struct Pipeline {
    composition: Composition,
    steps: Vec<Step>,
    resolved: Vec<Resolved>,
}

impl Pipeline {
    /// Sequential composition
    pub fn seq<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Step>,
    {
        Self::new(Composition::Seq, steps.into_iter().map(Into::into).collect())
    }

    /// Fan-out/fan-in composition with content-hash boundary names
    pub fn parallel<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Step>,
    {
        Self::parallel_with(steps, BoundaryNaming::default())
    }

    /// Fan-out/fan-in composition with an explicit boundary naming scheme
    pub fn parallel_with<I, S>(steps: I, naming: BoundaryNaming) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Step>,
    {
        let children: Vec<Step> = steps.into_iter().map(Into::into).collect();
        let child_names: Vec<Resolved> = children.iter().map(Step::resolve).collect();
        let mut flat = Vec::new();
        child_names.iter().for_each(|r| r.flatten_into(&mut flat));
        let names = naming.boundary_names(flat);

        let mut wrapped = Vec::with_capacity(children.len() + 2);
        wrapped.push(Step::Node(Node::scatter(names.scatter)));
        wrapped.extend(children);
        wrapped.push(Step::Node(Node::gather(names.gather)));
        Self::new(Composition::Parallel, wrapped)
    }

    fn new(composition: Composition, steps: Vec<Step>) -> Self {
        let resolved = steps.iter().map(Step::resolve).collect();
        Self {
            composition,
            steps,
            resolved,
        }
    }

    pub fn composition(&self) -> Composition {
        self.composition
    }

    /// All steps, including the Scatter/Gather boundaries of a parallel block
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Steps declared by the caller (boundaries excluded)
    pub fn children(&self) -> &[Step] {
        match self.composition {
            Composition::Seq => &self.steps,
            Composition::Parallel => &self.steps[1..self.steps.len() - 1],
        }
    }

    /// Resolved tree, one entry per step
    pub fn resolved(&self) -> &[Resolved] {
        &self.resolved
    }

    /// Node names in resolved order
    pub fn flatten(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.resolved.iter().for_each(|r| r.flatten_into(&mut out));
        out
    }

    /// Name of the first node to run, if any
    pub fn entry_name(&self) -> Option<&str> {
        self.flatten().first().copied()
    }

    /// Name of the last node to run, if any
    pub fn exit_name(&self) -> Option<&str> {
        self.flatten().last().copied()
    }

    /// Compile into a dependency graph with default options
    pub fn compile(&self) -> Result<Graph> {
        self.compile_with(&CompileOptions::default())
    }

    /// Compile into a dependency graph
    pub fn compile_with(&self, options: &CompileOptions) -> Result<Graph> {
        let mut graph = Graph::new();
        self.merge_block(&mut graph, options)?;
        if options.check_acyclic {
            graph.topological_order()?;
        }
        log::info!(
            "Compiled {} pipeline: {} nodes, {} edges",
            self.composition,
            graph.len(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Merge this pipeline's nodes and edges into `graph`
    ///
    /// Returns the entry and exit of the merged subgraph, or `None` when the
    /// pipeline contributes no nodes. A parallel block without any nodes
    /// inside it is skipped, so it neither breaks ordering in an enclosing
    /// Seq nor adds boundaries that would collide with another empty block.
    pub fn merge_into(&self, graph: &mut Graph, options: &CompileOptions) -> Result<Option<Span>> {
        if self.composition == Composition::Parallel && self.is_void() {
            self.check_empty(options)?;
            for step in self.children() {
                step.merge_into(graph, options)?;
            }
            log::debug!("Parallel: skipped block without nodes");
            return Ok(None);
        }
        self.merge_block(graph, options)
    }

    /// True when no step below this pipeline adds a node
    fn is_void(&self) -> bool {
        self.children().iter().all(Step::is_void)
    }

    fn merge_block(&self, graph: &mut Graph, options: &CompileOptions) -> Result<Option<Span>> {
        match self.composition {
            Composition::Seq => self.merge_seq(graph, options),
            Composition::Parallel => self.merge_parallel(graph, options),
        }
    }

    fn merge_seq(&self, graph: &mut Graph, options: &CompileOptions) -> Result<Option<Span>> {
        self.check_empty(options)?;

        let mut span: Option<Span> = None;
        for step in &self.steps {
            let Some(child) = step.merge_into(graph, options)? else {
                continue;
            };
            span = Some(match span {
                None => child,
                Some(prev) => {
                    graph.add_edge(prev.exit, child.entry)?;
                    Span {
                        entry: prev.entry,
                        exit: child.exit,
                    }
                }
            });
        }
        log::debug!("Seq: merged {} steps", self.steps.len());
        Ok(span)
    }

    fn merge_parallel(&self, graph: &mut Graph, options: &CompileOptions) -> Result<Option<Span>> {
        self.check_empty(options)?;

        let (Some(Step::Node(scatter)), Some(Step::Node(gather))) =
            (self.steps.first(), self.steps.last())
        else {
            return Err(PipecraftError::config(
                self.entry_name().unwrap_or_default(),
                "parallel block is missing its boundaries",
            ));
        };

        let scatter = graph.add_node(scatter.clone())?;
        let mut spans = Vec::with_capacity(self.children().len());
        for step in self.children() {
            if let Some(span) = step.merge_into(graph, options)? {
                spans.push(span);
            }
        }
        let gather = graph.add_node(gather.clone())?;

        for span in &spans {
            graph.add_edge(scatter, span.entry)?;
            graph.add_edge(span.exit, gather)?;
        }
        log::debug!("Parallel: fanned out to {} branches", spans.len());
        Ok(Some(Span {
            entry: scatter,
            exit: gather,
        }))
    }

    fn check_empty(&self, options: &CompileOptions) -> Result<()> {
        if !self.children().is_empty() {
            return Ok(());
        }
        if options.reject_empty {
            return Err(PipecraftError::EmptyComposition {
                kind: self.composition.to_string(),
            });
        }
        log::warn!("Empty {} composition", self.composition);
        Ok(())
    }
}

impl Step {
    fn resolve(&self) -> Resolved {
        match self {
            Step::Node(node) => match fan_out(node) {
                Some(parallel) => Resolved::Nested(parallel.resolved),
                None => Resolved::Leaf(node.name().to_string()),
            },
            // Skipped on merge, so it names nothing
            Step::Pipeline(pipeline) if pipeline.is_void() => Resolved::Nested(Vec::new()),
            Step::Pipeline(pipeline) => Resolved::Nested(pipeline.resolved.clone()),
        }
    }

    fn is_void(&self) -> bool {
        match self {
            Step::Node(_) => false,
            Step::Pipeline(pipeline) => pipeline.is_void(),
        }
    }

    /// Merge this step into `graph`, returning its entry and exit
    pub fn merge_into(&self, graph: &mut Graph, options: &CompileOptions) -> Result<Option<Span>> {
        match self {
            Step::Node(node) => match fan_out(node) {
                Some(parallel) => parallel.merge_into(graph, options),
                None => {
                    let index = graph.add_node(node.clone())?;
                    Ok(Some(Span {
                        entry: index,
                        exit: index,
                    }))
                }
            },
            Step::Pipeline(pipeline) => pipeline.merge_into(graph, options),
        }
    }
}

/// A ParContainer compiles exactly like a parallel block over its containers
fn fan_out(node: &Node) -> Option<Pipeline> {
    if node.node_type() != NodeType::ParContainer {
        return None;
    }
    Some(Pipeline::parallel(node.containers().iter().cloned()))
}
