//! `MockNode`: a test double for `ExecutableNode`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::{ExecutableNode, ExecutionContext, NodeError};

/// Behaviour injected into `MockNode` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Succeed.
    Succeed,
    /// Fail with the given message.
    Fail(String),
}

/// A mock node that records every node ID it executes and returns a
/// programmer-specified result.
#[derive(Debug, Clone)]
pub struct MockNode {
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// Optional latency before the result is returned.
    pub delay: Option<Duration>,
    /// Node IDs seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockNode {
    /// Create a mock that always succeeds.
    pub fn succeeding() -> Self {
        Self {
            behaviour: MockBehaviour::Succeed,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails with the given message.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self {
            behaviour: MockBehaviour::Fail(msg.into()),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep for `delay` before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Node IDs executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutableNode for MockNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), NodeError> {
        self.calls.lock().unwrap().push(ctx.node_id.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behaviour {
            MockBehaviour::Succeed => Ok(()),
            MockBehaviour::Fail(msg) => Err(NodeError::Failed(msg.clone())),
        }
    }
}
