//! Error types for pipeline composition and compilation

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias using PipecraftError
pub type Result<T> = std::result::Result<T, PipecraftError>;

/// Errors that can occur while building or compiling a pipeline
#[derive(Debug, Error)]
pub enum PipecraftError {
    /// A node was constructed with a malformed or missing configuration
    #[error("Invalid configuration for node '{node}': {reason}")]
    Configuration { node: String, reason: String },

    /// Two distinct nodes share the same name within one graph
    #[error("Duplicate node name: {0}")]
    DuplicateNodeName(String),

    /// The graph contains a cycle
    #[error("Cycle detected in graph involving nodes: {}", nodes.join(", "))]
    CyclicGraph { nodes: Vec<String> },

    /// A Seq or Parallel block has no children
    #[error("Empty {kind} composition")]
    EmptyComposition { kind: String },

    /// A node name was referenced but never inserted
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A graph document failed structural validation
    #[error("Invalid graph: {0}")]
    Validation(#[from] ValidationError),

    /// A backend handler rejected a node
    #[error("Dispatch failed for node '{node}': {message}")]
    Dispatch { node: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipecraftError {
    /// Create a configuration error for a node
    pub fn config(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Create a dispatch error for a node
    pub fn dispatch(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatch {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Name of the node this error is about, when there is one
    pub fn node_name(&self) -> Option<&str> {
        match self {
            Self::Configuration { node, .. } | Self::Dispatch { node, .. } => Some(node),
            Self::DuplicateNodeName(name) | Self::UnknownNode(name) => Some(name),
            Self::CyclicGraph { nodes } => nodes.first().map(String::as_str),
            Self::Validation(err) => err.node_name(),
            Self::EmptyComposition { .. } | Self::Serialization(_) => None,
        }
    }
}
