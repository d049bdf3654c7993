//! Error types for schema export and serialization.

use thiserror::Error;

use crate::node::NodeId;

/// Errors raised at the export/serialization boundary.
///
/// Inference and comparison never fail; these only surface when a graph is
/// walked by a consumer that needs every reference to resolve.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A node references an id that is not in the graph
    #[error("missing node {0}")]
    MissingNode(NodeId),

    /// Union nodes need at least two branches
    #[error("union type {id} must have at least 2 members, found {members}")]
    UnionArity { id: NodeId, members: usize },

    /// Graph (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
