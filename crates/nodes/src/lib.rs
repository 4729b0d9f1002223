//! `nodes` crate: the node-type catalogue, the `ExecutableNode` trait and
//! the built-in node implementations.
//!
//! The engine never runs a step itself: every node's unit of work is
//! dispatched through [`ExecutableNode`]. The only built-in implementation
//! is [`SimulatedNode`], a fixed-latency no-op standing in for real side
//! effects (HTTP calls, e-mail, SMS).

pub mod catalog;
pub mod error;
pub mod traits;
pub mod simulated;
pub mod mock;

pub use catalog::{DelayUnit, NodeKind, NodeType};
pub use error::NodeError;
pub use simulated::{SimulatedNode, EXECUTION_DELAY};
pub use traits::{ExecutableNode, ExecutionContext};
