//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator of a run:
//! 1. Claims the shared execution state (at most one run at a time).
//! 2. Validates the workflow and the graph's integrity.
//! 3. Locates the trigger node.
//! 4. Walks the graph depth-first from the trigger, siblings in edge order,
//!    dispatching each node through `ExecutableNode`.
//! 5. Checks for a user stop before and after every node.
//! 6. Resets the run flags on every exit path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use nodes::{ExecutableNode, ExecutionContext, NodeError, SimulatedNode, EXECUTION_DELAY};

use crate::graph::check_integrity;
use crate::models::{LogKind, Node, NodeStatus, Workflow};
use crate::sink::{lock_state, ExecutionSink, SharedExecutionState};
use crate::validation::ValidatorRegistry;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Latency of the simulated unit of work.
    pub node_delay: Duration,
    /// Fail a node whose unit of work takes longer than this.
    pub node_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            node_delay: EXECUTION_DELAY,
            node_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Node registry
// ---------------------------------------------------------------------------

/// Maps node labels to `ExecutableNode` implementations, with a fallback
/// used for every label that has none.
#[derive(Clone)]
pub struct NodeRegistry {
    fallback: Arc<dyn ExecutableNode>,
    by_label: HashMap<String, Arc<dyn ExecutableNode>>,
}

impl NodeRegistry {
    pub fn new(fallback: Arc<dyn ExecutableNode>) -> Self {
        Self {
            fallback,
            by_label: HashMap::new(),
        }
    }

    /// Every node runs the fixed-latency simulation.
    pub fn simulated(delay: Duration) -> Self {
        Self::new(Arc::new(SimulatedNode::new(delay)))
    }

    pub fn register(&mut self, label: impl Into<String>, node: Arc<dyn ExecutableNode>) {
        self.by_label.insert(label.into(), node);
    }

    pub fn resolve(&self, label: &str) -> &Arc<dyn ExecutableNode> {
        self.by_label.get(label).unwrap_or(&self.fallback)
    }
}

// ---------------------------------------------------------------------------
// Run context and result
// ---------------------------------------------------------------------------

/// Everything one run needs from its caller.
pub struct RunContext<'a> {
    /// The graph to walk; read-only for the whole run.
    pub workflow: &'a Workflow,
    /// Run flags, logs and statuses; `stop` flips `is_running` here.
    pub state: &'a SharedExecutionState,
    pub sink: &'a dyn ExecutionSink,
}

/// The outcome of one run.
#[derive(Debug)]
pub struct ExecutionResult {
    pub success: bool,
    pub error: Option<EngineError>,
    /// Node IDs in the order they executed successfully.
    pub executed_nodes: Vec<String>,
}

impl ExecutionResult {
    fn succeeded(executed_nodes: Vec<String>) -> Self {
        Self {
            success: true,
            error: None,
            executed_nodes,
        }
    }

    fn failed(error: EngineError, executed_nodes: Vec<String>) -> Self {
        Self {
            success: false,
            error: Some(error),
            executed_nodes,
        }
    }

    pub fn was_stopped(&self) -> bool {
        matches!(self.error, Some(EngineError::Stopped))
    }
}

/// Releases the run's hold on the state when dropped, so cleanup also
/// happens when the run future is dropped or a node panics.
struct RunGuard<'a> {
    state: &'a SharedExecutionState,
    run_id: Uuid,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        lock_state(self.state).end_run(self.run_id);
    }
}

/// `run_id` still owns the state and nobody has stopped it.
fn is_active(state: &SharedExecutionState, run_id: Uuid) -> bool {
    lock_state(state).is_active(run_id)
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless orchestrator that runs workflows.
///
/// All run state lives in the `SharedExecutionState` handed to
/// [`WorkflowExecutor::start`]; one executor can serve any number of
/// controllers.
#[derive(Clone)]
pub struct WorkflowExecutor {
    registry: NodeRegistry,
    validators: ValidatorRegistry,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(
        registry: NodeRegistry,
        validators: ValidatorRegistry,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            validators,
            config,
        }
    }

    /// Executor whose nodes all run the fixed-latency simulation.
    pub fn simulated(config: ExecutorConfig) -> Self {
        Self::new(
            NodeRegistry::simulated(config.node_delay),
            ValidatorRegistry::default(),
            config,
        )
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    /// Run the workflow from its trigger node.
    ///
    /// Never returns an `Err`: every failure (already running, validation,
    /// node error, user stop) is reported in the [`ExecutionResult`].
    ///
    /// A run that was stopped keeps the state until it has finished its
    /// current node, so a `start` in that window is also "already running".
    pub async fn start(&self, ctx: RunContext<'_>) -> ExecutionResult {
        let run_id = Uuid::new_v4();
        {
            let mut state = lock_state(ctx.state);
            if state.is_occupied() {
                warn!("start requested while a run is in progress");
                return ExecutionResult::failed(EngineError::AlreadyRunning, Vec::new());
            }
            state.begin_run(run_id);
        }
        let _guard = RunGuard {
            state: ctx.state,
            run_id,
        };

        self.run(run_id, &ctx).await
    }

    #[instrument(
        name = "workflow_run",
        skip(self, ctx),
        fields(nodes = ctx.workflow.nodes.len())
    )]
    async fn run(&self, run_id: Uuid, ctx: &RunContext<'_>) -> ExecutionResult {
        let workflow = ctx.workflow;

        // ------------------------------------------------------------------
        // Validation gate: nothing executes unless the workflow is clean.
        // ------------------------------------------------------------------
        let mut errors = self.validators.validate_workflow(&workflow.nodes).errors;
        errors.extend(check_integrity(workflow).iter().map(ToString::to_string));
        if !errors.is_empty() {
            warn!("workflow validation failed with {} error(s)", errors.len());
            lock_state(ctx.state).logs.clear();
            for message in &errors {
                ctx.sink.on_log(LogKind::Error, message.clone());
            }
            return ExecutionResult::failed(EngineError::Validation(errors), Vec::new());
        }

        // ------------------------------------------------------------------
        // Locate the trigger.
        // ------------------------------------------------------------------
        let Some(trigger) = workflow.find_trigger_node() else {
            let err = EngineError::NoTriggerNode;
            ctx.sink.on_log(LogKind::Error, err.to_string());
            return ExecutionResult::failed(err, Vec::new());
        };

        let ignored: Vec<&str> = workflow
            .trigger_nodes()
            .skip(1)
            .map(|n| n.id.as_str())
            .collect();
        if !ignored.is_empty() {
            ctx.sink.on_log(
                LogKind::Warning,
                format!(
                    "Multiple trigger nodes found; starting from {} ({}) and ignoring: {}",
                    trigger.label,
                    trigger.id,
                    ignored.join(", ")
                ),
            );
        }

        for node in &workflow.nodes {
            ctx.sink.on_status_change(&node.id, NodeStatus::Pending);
        }
        ctx.sink.on_log(
            LogKind::Info,
            format!("Starting workflow execution from: {}", trigger.label),
        );

        // ------------------------------------------------------------------
        // Traverse.
        // ------------------------------------------------------------------
        let mut executed = Vec::new();
        match self.traverse(run_id, &trigger.id, ctx, &mut executed).await {
            Ok(()) => {
                let reached: HashSet<&str> = executed.iter().map(String::as_str).collect();
                for node in workflow.nodes.iter().filter(|n| !reached.contains(n.id.as_str())) {
                    ctx.sink.on_status_change(&node.id, NodeStatus::Skipped);
                }
                ctx.sink.on_log(
                    LogKind::Success,
                    format!(
                        "Workflow execution completed successfully ({} nodes)",
                        executed.len()
                    ),
                );
                info!("run completed: {} node(s) executed", executed.len());
                ExecutionResult::succeeded(executed)
            }
            Err(EngineError::Stopped) => {
                ctx.sink.on_log(LogKind::Warning, "Workflow execution stopped by user".into());
                info!("run stopped after {} node(s)", executed.len());
                ExecutionResult::failed(EngineError::Stopped, executed)
            }
            Err(err) => {
                ctx.sink.on_log(LogKind::Error, format!("Workflow execution failed: {err}"));
                error!("run failed: {err}");
                ExecutionResult::failed(err, executed)
            }
        }
    }

    /// Depth-first walk with an explicit stack. Children are pushed in
    /// reverse edge order so they pop in edge order, and a whole branch
    /// finishes before its next sibling starts.
    async fn traverse(
        &self,
        run_id: Uuid,
        trigger_id: &str,
        ctx: &RunContext<'_>,
        executed: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        let workflow = ctx.workflow;
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![trigger_id];

        while let Some(node_id) = stack.pop() {
            // Already executed this run: the branch ends here, successfully.
            if visited.contains(node_id) {
                continue;
            }

            if !is_active(ctx.state, run_id) {
                return Err(EngineError::Stopped);
            }

            let Some(node) = workflow.node_by_id(node_id) else {
                ctx.sink.on_log(LogKind::Error, format!("Node not found: {node_id}"));
                return Err(EngineError::NodeNotFound(node_id.to_owned()));
            };

            self.execute_node(run_id, node, ctx).await?;
            visited.insert(node_id);
            executed.push(node_id.to_owned());

            if !is_active(ctx.state, run_id) {
                return Err(EngineError::Stopped);
            }

            stack.extend(workflow.next_nodes(node_id).into_iter().rev());
        }

        Ok(())
    }

    async fn execute_node(
        &self,
        run_id: Uuid,
        node: &Node,
        ctx: &RunContext<'_>,
    ) -> Result<(), EngineError> {
        lock_state(ctx.state).current_node_id = Some(node.id.clone());
        ctx.sink.on_status_change(&node.id, NodeStatus::Running);
        ctx.sink.on_log(
            LogKind::Info,
            format!("Executing: {} ({})", node.label, node.id),
        );

        let node_ctx = ExecutionContext {
            run_id,
            node_id: node.id.clone(),
            label: node.label.clone(),
            node_type: node.node_type(),
            config: node.config.clone(),
        };
        let runner = self.registry.resolve(&node.label);

        let outcome = match self.config.node_timeout {
            Some(limit) => tokio::time::timeout(limit, runner.execute(&node_ctx))
                .await
                .unwrap_or(Err(NodeError::Timeout(limit))),
            None => runner.execute(&node_ctx).await,
        };

        match outcome {
            Ok(()) => {
                ctx.sink.on_status_change(&node.id, NodeStatus::Success);
                ctx.sink.on_log(LogKind::Success, format!("Completed: {}", node.label));
                info!("node '{}' succeeded", node.id);
                Ok(())
            }
            Err(source) => {
                ctx.sink.on_status_change(&node.id, NodeStatus::Error);
                ctx.sink.on_log(
                    LogKind::Error,
                    format!("Error in {} ({}): {source}", node.label, node.id),
                );
                error!("node '{}' failed: {}", node.id, source);
                Err(EngineError::NodeFailed {
                    node_id: node.id.clone(),
                    label: node.label.clone(),
                    source,
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Run control
    // -----------------------------------------------------------------------

    /// Set the advisory pause flag. In-flight work is not interrupted.
    pub fn pause(state: &SharedExecutionState, sink: &dyn ExecutionSink) {
        lock_state(state).is_paused = true;
        sink.on_log(LogKind::Warning, "Execution paused".into());
    }

    /// Clear the advisory pause flag.
    pub fn resume(state: &SharedExecutionState, sink: &dyn ExecutionSink) {
        lock_state(state).is_paused = false;
        sink.on_log(LogKind::Info, "Execution resumed".into());
    }

    /// Request cancellation. The run unwinds at its next node boundary.
    /// Does nothing when no run is in progress.
    pub fn stop(state: &SharedExecutionState, sink: &dyn ExecutionSink) {
        {
            let mut state = lock_state(state);
            if !state.is_running {
                debug!("stop requested with no run in progress");
                return;
            }
            state.is_running = false;
            state.is_paused = false;
            state.current_node_id = None;
        }
        sink.on_log(LogKind::Warning, "Execution stopped by user".into());
    }
}
