//! Core types for pipeline nodes
//!
//! These types define the atomic units a pipeline is composed of: nodes,
//! their variant-specific configuration, and their named input/output path
//! slots.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PipecraftError, Result};

/// Human-readable node identifier
pub type NodeName = String;

/// Named path slots, each holding an ordered list of paths
pub type PathMap = BTreeMap<String, Vec<String>>;

/// Image used when a container node is built without a configuration
pub const DEFAULT_CONTAINER_IMAGE: &str = "python:3.10";

/// The variant tag of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    /// Callable invoked inside a virtual environment
    PyFunction,
    /// Shell command
    InvokeShell,
    /// Single container run
    Container,
    /// Homogeneous container fan-out over units of work
    ParContainer,
    /// Synthetic start of a parallel block
    Scatter,
    /// Synthetic end of a parallel block
    Gather,
}

impl NodeType {
    /// Whether this is a synthetic Scatter/Gather boundary
    pub fn is_boundary(&self) -> bool {
        matches!(self, NodeType::Scatter | NodeType::Gather)
    }

    /// Short tag used when displaying nodes
    pub fn tag(&self) -> &'static str {
        match self {
            NodeType::PyFunction => "PF",
            NodeType::InvokeShell => "SH",
            NodeType::Container => "CS",
            NodeType::ParContainer => "CO",
            NodeType::Scatter => "SC",
            NodeType::Gather => "GA",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeType::PyFunction => "PyFunction",
            NodeType::InvokeShell => "InvokeShell",
            NodeType::Container => "Container",
            NodeType::ParContainer => "ParContainer",
            NodeType::Scatter => "Scatter",
            NodeType::Gather => "Gather",
        };
        f.write_str(label)
    }
}

/// Configuration for a Python function node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyFunctionConfig {
    /// Reference to the callable (opaque to the compiler)
    pub py_object: serde_json::Value,
    /// Virtual environment the callable runs in
    pub venv: PathBuf,
}

impl Default for PyFunctionConfig {
    fn default() -> Self {
        Self {
            py_object: serde_json::Value::Object(serde_json::Map::new()),
            venv: PathBuf::new(),
        }
    }
}

/// Configuration for a shell command node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeShellConfig {
    /// Command line to run
    pub command: String,
    /// Environment variables for the command
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl InvokeShellConfig {
    /// Create a shell config for a command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: BTreeMap::new(),
        }
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Configuration for a container node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    /// Image to run
    pub image: String,
    /// Command to run inside the container
    #[serde(default)]
    pub cmd: Vec<String>,
    /// Environment variables to set in the container
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ContainerConfig {
    /// Create a container config for an image
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            cmd: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Set the command
    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONTAINER_IMAGE)
    }
}

/// One (inputs, outputs) pairing under a ParContainer fan-out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitOfWork {
    /// Paths consumed by this unit
    pub inputs: PathMap,
    /// Paths produced by this unit
    pub outputs: PathMap,
}

impl UnitOfWork {
    pub fn new(inputs: PathMap, outputs: PathMap) -> Self {
        Self { inputs, outputs }
    }
}

/// Variant-specific payload of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeConfig {
    PyFunction(PyFunctionConfig),
    InvokeShell(InvokeShellConfig),
    Container(ContainerConfig),
    /// Shared config plus the generated `{name}_{i}` containers
    #[serde(rename_all = "camelCase")]
    ParContainer {
        config: ContainerConfig,
        containers: Vec<Node>,
    },
    Scatter(PyFunctionConfig),
    Gather(PyFunctionConfig),
}

/// A schedulable unit of work with named input/output path slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    name: NodeName,
    #[serde(default)]
    input_paths: PathMap,
    #[serde(default)]
    output_paths: PathMap,
    config: NodeConfig,
}

impl Node {
    /// Create a Python function node
    ///
    /// Without a config the node gets an empty callable reference and an
    /// empty venv path.
    pub fn py_function(
        name: impl Into<String>,
        input_paths: PathMap,
        output_paths: PathMap,
        config: Option<PyFunctionConfig>,
    ) -> Result<Self> {
        let name = name.into();
        let config = config.unwrap_or_else(|| {
            log::debug!("PyFunction '{}': using default config", name);
            PyFunctionConfig::default()
        });
        Self::checked(name, input_paths, output_paths, NodeConfig::PyFunction(config))
    }

    /// Create a shell command node
    pub fn invoke_shell(
        name: impl Into<String>,
        input_paths: PathMap,
        output_paths: PathMap,
        config: InvokeShellConfig,
    ) -> Result<Self> {
        Self::checked(
            name.into(),
            input_paths,
            output_paths,
            NodeConfig::InvokeShell(config),
        )
    }

    /// Create a container node
    ///
    /// Without a config the node runs the placeholder image
    /// [`DEFAULT_CONTAINER_IMAGE`] with no command.
    pub fn container(
        name: impl Into<String>,
        input_paths: PathMap,
        output_paths: PathMap,
        config: Option<ContainerConfig>,
    ) -> Result<Self> {
        let name = name.into();
        let config = config.unwrap_or_else(|| {
            log::debug!("Container '{}': using default image", name);
            ContainerConfig::default()
        });
        Self::checked(name, input_paths, output_paths, NodeConfig::Container(config))
    }

    /// Create a container fan-out with one `{name}_{i}` container per unit of work
    ///
    /// The ParContainer itself exposes no IO paths; each generated container
    /// takes its unit's inputs and outputs unchanged and shares `config`.
    pub fn par_container(
        name: impl Into<String>,
        units: Vec<UnitOfWork>,
        config: Option<ContainerConfig>,
    ) -> Result<Self> {
        let name = name.into();
        if units.is_empty() {
            return Err(PipecraftError::config(name, "no units of work"));
        }
        let config = config.unwrap_or_default();
        let containers = units
            .into_iter()
            .enumerate()
            .map(|(i, uow)| {
                Node::container(
                    format!("{}_{}", name, i),
                    uow.inputs,
                    uow.outputs,
                    Some(config.clone()),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Self::checked(
            name,
            PathMap::new(),
            PathMap::new(),
            NodeConfig::ParContainer { config, containers },
        )
    }

    /// Create a Scatter boundary node
    pub(crate) fn scatter(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_paths: PathMap::new(),
            output_paths: PathMap::new(),
            config: NodeConfig::Scatter(PyFunctionConfig::default()),
        }
    }

    /// Create a Gather boundary node
    pub(crate) fn gather(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_paths: PathMap::new(),
            output_paths: PathMap::new(),
            config: NodeConfig::Gather(PyFunctionConfig::default()),
        }
    }

    fn checked(
        name: NodeName,
        input_paths: PathMap,
        output_paths: PathMap,
        config: NodeConfig,
    ) -> Result<Self> {
        let node = Self {
            name,
            input_paths,
            output_paths,
            config,
        };
        node.validate()?;
        Ok(node)
    }

    /// Check the node's configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipecraftError::config(&self.name, "node name is empty"));
        }
        match &self.config {
            NodeConfig::Container(config) => check_image(&self.name, config),
            NodeConfig::InvokeShell(config) if config.command.trim().is_empty() => {
                Err(PipecraftError::config(&self.name, "shell command is empty"))
            }
            NodeConfig::ParContainer { config, containers } => {
                check_image(&self.name, config)?;
                if containers.is_empty() {
                    return Err(PipecraftError::config(&self.name, "no units of work"));
                }
                if !self.input_paths.is_empty() || !self.output_paths.is_empty() {
                    return Err(PipecraftError::config(
                        &self.name,
                        "IO paths belong to the generated containers",
                    ));
                }
                containers.iter().try_for_each(Node::validate)
            }
            _ => Ok(()),
        }
    }

    /// Unique name of this node
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variant tag of this node
    pub fn node_type(&self) -> NodeType {
        match &self.config {
            NodeConfig::PyFunction(_) => NodeType::PyFunction,
            NodeConfig::InvokeShell(_) => NodeType::InvokeShell,
            NodeConfig::Container(_) => NodeType::Container,
            NodeConfig::ParContainer { .. } => NodeType::ParContainer,
            NodeConfig::Scatter(_) => NodeType::Scatter,
            NodeConfig::Gather(_) => NodeType::Gather,
        }
    }

    pub fn input_paths(&self) -> &PathMap {
        &self.input_paths
    }

    pub fn output_paths(&self) -> &PathMap {
        &self.output_paths
    }

    /// Variant-specific configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Containers generated by a ParContainer (empty for other variants)
    pub fn containers(&self) -> &[Node] {
        match &self.config {
            NodeConfig::ParContainer { containers, .. } => containers,
            _ => &[],
        }
    }

    pub fn is_boundary(&self) -> bool {
        self.node_type().is_boundary()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node_type() {
            NodeType::Scatter => f.write_str("Scatter"),
            NodeType::Gather => f.write_str("Gather"),
            other => write!(f, "{}({})", self.name, other.tag()),
        }
    }
}

fn check_image(name: &str, config: &ContainerConfig) -> Result<()> {
    if config.image.trim().is_empty() {
        return Err(PipecraftError::config(name, "container image is empty"));
    }
    Ok(())
}

/// Build a [`PathMap`] from `(slot, paths)` pairs
pub fn path_map<I, K, P, S>(slots: I) -> PathMap
where
    I: IntoIterator<Item = (K, P)>,
    K: Into<String>,
    P: IntoIterator<Item = S>,
    S: Into<String>,
{
    slots
        .into_iter()
        .map(|(slot, paths)| (slot.into(), paths.into_iter().map(Into::into).collect()))
        .collect()
}
