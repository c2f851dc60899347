//! Fluent builders for nodes and pipelines
//!
//! Provides a fluent API for constructing nodes with their IO slots and
//! configuration, and for assembling pipelines step by step.

use std::path::PathBuf;

use crate::error::{PipecraftError, Result};
use crate::naming::BoundaryNaming;
use crate::pipeline::{Composition, Pipeline, Step};
use crate::types::{
    ContainerConfig, InvokeShellConfig, Node, NodeType, PathMap, PyFunctionConfig, UnitOfWork,
};

/// Fluent builder for a single node
///
/// # Example
///
/// ```ignore
/// let node = NodeBuilder::container("segment")
///     .input("images", ["plate1/A01.tif"])
///     .output("masks", ["seg/A01.tif"])
///     .image("cellprofiler/cellprofiler:4.2.6")
///     .cmd(["cellprofiler", "-c", "-p", "seg.cppipe"])
///     .build()?;
/// ```
pub struct NodeBuilder {
    name: String,
    node_type: NodeType,
    input_paths: PathMap,
    output_paths: PathMap,
    py_function: Option<PyFunctionConfig>,
    shell: Option<InvokeShellConfig>,
    container: Option<ContainerConfig>,
    units: Vec<UnitOfWork>,
    mismatch: Option<&'static str>,
}

impl NodeBuilder {
    fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            input_paths: PathMap::new(),
            output_paths: PathMap::new(),
            py_function: None,
            shell: None,
            container: None,
            units: Vec::new(),
            mismatch: None,
        }
    }

    /// Start a Python function node
    pub fn py_function(name: impl Into<String>) -> Self {
        Self::new(name, NodeType::PyFunction)
    }

    /// Start a shell command node
    pub fn invoke_shell(name: impl Into<String>, command: impl Into<String>) -> Self {
        let mut builder = Self::new(name, NodeType::InvokeShell);
        builder.shell = Some(InvokeShellConfig::new(command));
        builder
    }

    /// Start a container node
    pub fn container(name: impl Into<String>) -> Self {
        Self::new(name, NodeType::Container)
    }

    /// Start a container fan-out; add work with [`NodeBuilder::unit`]
    pub fn par_container(name: impl Into<String>) -> Self {
        Self::new(name, NodeType::ParContainer)
    }

    /// Append paths to an input slot
    pub fn input<I, S>(mut self, slot: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_paths
            .entry(slot.into())
            .or_default()
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Append paths to an output slot
    pub fn output<I, S>(mut self, slot: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_paths
            .entry(slot.into())
            .or_default()
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Add a unit of work to a ParContainer
    pub fn unit(mut self, unit: UnitOfWork) -> Self {
        self.require(NodeType::ParContainer, "units of work");
        self.units.push(unit);
        self
    }

    /// Set the callable reference of a PyFunction
    pub fn py_object(mut self, py_object: serde_json::Value) -> Self {
        self.require(NodeType::PyFunction, "py_object");
        self.py_function.get_or_insert_with(PyFunctionConfig::default).py_object = py_object;
        self
    }

    /// Set the virtual environment of a PyFunction
    pub fn venv(mut self, venv: impl Into<PathBuf>) -> Self {
        self.require(NodeType::PyFunction, "venv");
        self.py_function.get_or_insert_with(PyFunctionConfig::default).venv = venv.into();
        self
    }

    /// Set the container image
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.require_container("image");
        self.container.get_or_insert_with(ContainerConfig::default).image = image.into();
        self
    }

    /// Set the container command
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_container("cmd");
        self.container.get_or_insert_with(ContainerConfig::default).cmd =
            cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable (containers and shell commands)
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self.node_type {
            NodeType::InvokeShell => {
                if let Some(shell) = self.shell.as_mut() {
                    shell.env.insert(key.into(), value.into());
                }
            }
            NodeType::Container | NodeType::ParContainer => {
                self.container
                    .get_or_insert_with(ContainerConfig::default)
                    .env
                    .insert(key.into(), value.into());
            }
            _ => self.mismatch = self.mismatch.or(Some("env")),
        }
        self
    }

    fn require(&mut self, node_type: NodeType, setting: &'static str) {
        if self.node_type != node_type && self.mismatch.is_none() {
            self.mismatch = Some(setting);
        }
    }

    fn require_container(&mut self, setting: &'static str) {
        if !matches!(self.node_type, NodeType::Container | NodeType::ParContainer)
            && self.mismatch.is_none()
        {
            self.mismatch = Some(setting);
        }
    }

    /// Build and validate the node
    pub fn build(self) -> Result<Node> {
        if let Some(setting) = self.mismatch {
            return Err(PipecraftError::config(
                self.name,
                format!("{} does not apply to a {} node", setting, self.node_type),
            ));
        }
        match self.node_type {
            NodeType::PyFunction => Node::py_function(
                self.name,
                self.input_paths,
                self.output_paths,
                self.py_function,
            ),
            NodeType::InvokeShell => Node::invoke_shell(
                self.name,
                self.input_paths,
                self.output_paths,
                self.shell.unwrap_or_else(|| InvokeShellConfig::new("")),
            ),
            NodeType::Container => Node::container(
                self.name,
                self.input_paths,
                self.output_paths,
                self.container,
            ),
            NodeType::ParContainer => {
                if !self.input_paths.is_empty() || !self.output_paths.is_empty() {
                    return Err(PipecraftError::config(
                        self.name,
                        "IO paths belong to units of work",
                    ));
                }
                Node::par_container(self.name, self.units, self.container)
            }
            NodeType::Scatter | NodeType::Gather => Err(PipecraftError::config(
                self.name,
                "boundary nodes are generated by parallel blocks",
            )),
        }
    }
}

/// Fluent builder for pipelines
///
/// # Example
///
/// ```ignore
/// let pipe = PipelineBuilder::seq()
///     .node(illum)
///     .pipeline(PipelineBuilder::parallel().node(seg_a).node(seg_b).build())
///     .node(stitch)
///     .build();
/// ```
pub struct PipelineBuilder {
    composition: Composition,
    naming: BoundaryNaming,
    steps: Vec<Step>,
}

impl PipelineBuilder {
    /// Start a sequential pipeline
    pub fn seq() -> Self {
        Self {
            composition: Composition::Seq,
            naming: BoundaryNaming::default(),
            steps: Vec::new(),
        }
    }

    /// Start a parallel pipeline
    pub fn parallel() -> Self {
        Self {
            composition: Composition::Parallel,
            ..Self::seq()
        }
    }

    /// Choose how Scatter/Gather nodes are named (parallel only)
    pub fn naming(mut self, naming: BoundaryNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Append a node
    pub fn node(mut self, node: Node) -> Self {
        self.steps.push(Step::Node(node));
        self
    }

    /// Append a nested pipeline
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.steps.push(Step::Pipeline(pipeline));
        self
    }

    /// Append any step
    pub fn step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Build the pipeline (resolution happens here)
    pub fn build(self) -> Pipeline {
        match self.composition {
            Composition::Seq => Pipeline::seq(self.steps),
            Composition::Parallel => Pipeline::parallel_with(self.steps, self.naming),
        }
    }
}
