//! The `ExecutableNode` trait: the contract every node's unit of work must fulfil.

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{NodeError, NodeType};

/// Everything a node sees while it executes.
///
/// Defined here (in the nodes crate) so both the engine and individual node
/// implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the current run.
    pub run_id: Uuid,
    /// ID of the node being executed.
    pub node_id: String,
    /// The node's label.
    pub label: String,
    /// Resolved built-in type, `None` for pluggable labels.
    pub node_type: Option<NodeType>,
    /// Snapshot of the node's configuration at run start.
    pub config: Map<String, Value>,
}

/// One node's unit of work.
///
/// Implementations must not mutate the graph; they only report success or
/// failure. This is the hook where real side effects are substituted.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), NodeError>;
}
