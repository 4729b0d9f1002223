//! `engine` crate: workflow graph model, validation, undo/redo history,
//! the execution engine and the controller that ties them together.

pub mod autosave;
pub mod controller;
pub mod error;
pub mod executor;
pub mod graph;
pub mod history;
pub mod models;
pub mod persistence;
pub mod sink;
pub mod validation;

pub use controller::{ControllerConfig, EdgeUpdate, NodeDraft, NodeUpdate, WorkflowController};
pub use error::{EngineError, GraphError, PersistenceError};
pub use executor::{ExecutionResult, ExecutorConfig, NodeRegistry, RunContext, WorkflowExecutor};
pub use history::{HistoryInfo, HistoryState, HISTORY_LIMIT};
pub use models::{
    Edge, ExecutionState, LogEntry, LogKind, Node, NodeStatus, Position, Workflow, WorkflowSnapshot,
};
pub use persistence::{BlobStore, MemoryBlobStore, SqlBlobStore};
pub use sink::{ExecutionSink, SharedExecutionState, StateSink};
pub use validation::{ValidationReport, ValidatorRegistry};
