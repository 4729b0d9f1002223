//! Node-level error type.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by a node's `execute` method.
///
/// There is no retry policy: the engine fails the whole run on the first
/// error of either variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The unit of work itself failed.
    #[error("{0}")]
    Failed(String),

    /// The unit of work did not finish within the configured node timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
