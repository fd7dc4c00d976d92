//! Error types for model operations.
//!
//! Every variant renders a short human-readable reason; hosts show the
//! `Display` text to the user as-is.

use crate::id::ElementId;
use thiserror::Error;

/// Why `add_edge` refused a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EdgeError {
    #[error("Port '{0}' does not exist")]
    UnknownPort(ElementId),

    #[error("Cannot connect node '{node}' to itself")]
    SelfLoop { node: ElementId },

    #[error("Edge from '{source_id}' to '{target_id}' already exists")]
    Duplicate {
        source_id: ElementId,
        target_id: ElementId,
    },
}

/// Structural violations when inserting elements into the graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Element id '{0}' is already in use")]
    DuplicateId(ElementId),

    #[error("Parent '{0}' not found or cannot hold nodes")]
    InvalidParent(ElementId),

    #[error("Node '{id}' has a non-positive size {width}x{height}")]
    InvalidSize {
        id: ElementId,
        width: f64,
        height: f64,
    },
}

/// Failure to import a vector-art payload. The model is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("Payload has no <svg> root element")]
    MissingSvgRoot,

    #[error("Malformed SVG markup near byte {offset}")]
    Malformed { offset: usize },

    #[error("Invalid size attribute '{0}'")]
    InvalidSize(String),
}

/// Failure to bulk-load a serialized document. The model is left untouched.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Root element must have type \"graph\", found \"{0}\"")]
    NotAGraph(String),

    #[error("Ports can only appear inside nodes (found '{0}' at the top level)")]
    StrayPort(ElementId),

    #[error("Edges can only appear at the top level (found '{0}' inside a node)")]
    NestedEdge(ElementId),

    #[error("Edge id '{0}' is used more than once")]
    DuplicateEdgeId(ElementId),

    #[error("Edge '{id}' is invalid: {reason}")]
    InvalidEdge { id: ElementId, reason: EdgeError },

    #[error(transparent)]
    Model(#[from] ModelError),
}
