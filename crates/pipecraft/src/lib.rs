//! Pipecraft - Declarative pipeline composition for StarryNight
//!
//! This crate turns nested Seq/Parallel compositions of work nodes into a
//! flat dependency graph that execution backends can schedule. It supports:
//!
//! - Typed work nodes (Python functions, shell commands, containers)
//! - Sequential and parallel composition with arbitrary nesting
//! - Scatter/Gather boundary nodes around every parallel block
//! - Fan-out of one container config over many units of work
//! - Graph documents for handing compiled graphs to backends
//!
//! # Architecture
//!
//! - `Node`: a schedulable unit with named input/output path slots
//! - `Pipeline`: an immutable Seq or Parallel composition of nodes and pipelines
//! - `Graph`: the compiled DAG, an arena of nodes plus deduplicated edges
//! - `DispatchRegistry`: maps node types to backend handlers
//!
//! # Example
//!
//! ```ignore
//! use pipecraft::{Node, Pipeline, Step};
//!
//! let graph = Pipeline::seq([
//!     Step::from(illum),
//!     Pipeline::parallel([segment_a, segment_b]).into(),
//!     Step::from(stitch),
//! ])
//! .compile()?;
//! ```

pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod naming;
pub mod pipeline;
pub mod registry;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::{NodeBuilder, PipelineBuilder};
pub use config::CompileOptions;
pub use document::{DocumentEdge, GraphDocument};
pub use error::{PipecraftError, Result};
pub use graph::{Edge, Graph, NodeIndex};
pub use naming::{BoundaryNames, BoundaryNaming};
pub use pipeline::{Composition, Pipeline, Resolved, Span, Step};
pub use registry::{DispatchPlan, DispatchRegistry, FnNodeHandler, NodeHandler};
pub use types::{
    path_map, ContainerConfig, InvokeShellConfig, Node, NodeConfig, NodeName, NodeType,
    PathMap, PyFunctionConfig, UnitOfWork,
};
pub use validation::{validate_document, ValidationError};
