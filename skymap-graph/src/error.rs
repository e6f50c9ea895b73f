//! Error types for the skymap-graph crate.

use crate::edge::RelationshipKind;
use crate::node::{LabelError, NodeKeyError};
use thiserror::Error;

/// Errors related to graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Node already exists: {0}")]
    DuplicateNode(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge already exists: {source_node} --{kind}--> {target_node}")]
    DuplicateEdge {
        source_node: String,
        target_node: String,
        kind: RelationshipKind,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Invalid label: {0}")]
    Label(#[from] LabelError),

    #[error("Invalid node key: {0}")]
    Key(#[from] NodeKeyError),
}
