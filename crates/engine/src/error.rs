//! Engine-level error types.

use thiserror::Error;

use nodes::NodeError;

/// Integrity violations of the graph model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// Two or more edges share the same ID.
    #[error("duplicate edge ID: '{0}'")]
    DuplicateEdgeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge '{edge_id}' references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        edge_id: String,
        node_id: String,
        side: &'static str,
    },
}

/// Errors from the persistence collaborator and import/export framing.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage error: {0}")]
    Storage(#[from] db::DbError),

    #[error("Failed to serialize workflow: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Invalid workflow format: {0}")]
    InvalidFormat(String),
}

/// Errors produced by the workflow engine (validation, execution, editing).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Run lifecycle ------

    /// `start` was called while another run is in progress.
    #[error("already running")]
    AlreadyRunning,

    /// The run was cancelled through `stop`.
    #[error("stopped by user")]
    Stopped,

    // ------ Validation errors ------

    /// Structural or per-node validation failed; carries every message.
    #[error("workflow validation failed with {} error(s)", .0.len())]
    Validation(Vec<String>),

    #[error("No trigger node found. Please add a trigger node (Manual or Webhook) to start the workflow.")]
    NoTriggerNode,

    #[error(transparent)]
    Graph(#[from] GraphError),

    // ------ Execution errors ------

    /// A node failed; the whole run is aborted.
    #[error("node '{node_id}' ({label}) failed: {source}")]
    NodeFailed {
        node_id: String,
        label: String,
        #[source]
        source: NodeError,
    },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    /// Persistence or import/export failure surfaced by the controller.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
