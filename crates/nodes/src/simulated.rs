//! `SimulatedNode`: the default unit of work: wait, then succeed.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::{ExecutableNode, ExecutionContext, NodeError};

/// Latency of one simulated step.
pub const EXECUTION_DELAY: Duration = Duration::from_millis(1000);

/// Fixed-latency no-op node.
///
/// The sleep is the run's suspension point; it does not observe pause or
/// stop while in flight.
#[derive(Debug, Clone)]
pub struct SimulatedNode {
    delay: Duration,
}

impl SimulatedNode {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for SimulatedNode {
    fn default() -> Self {
        Self::new(EXECUTION_DELAY)
    }
}

#[async_trait]
impl ExecutableNode for SimulatedNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), NodeError> {
        debug!(node_id = %ctx.node_id, label = %ctx.label, delay = ?self.delay, "simulating node");
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn completes_after_its_delay() {
        let node = SimulatedNode::new(Duration::from_millis(250));
        let ctx = ExecutionContext {
            run_id: Uuid::new_v4(),
            node_id: "n1".into(),
            label: "HTTP".into(),
            node_type: None,
            config: Map::new(),
        };

        let started = tokio::time::Instant::now();
        node.execute(&ctx).await.expect("simulated node never fails");
        assert_eq!(started.elapsed(), Duration::from_millis(250));
    }
}
