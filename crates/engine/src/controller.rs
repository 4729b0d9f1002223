//! The workflow controller: single owner and writer of the live graph.
//!
//! Every mutating edit records one history snapshot and schedules an
//! autosave. Runs execute on a copy of the graph, so editing during a run
//! never affects the run in progress.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use nodes::{NodeKind, NodeType};

use crate::autosave::{AutosaveHandle, AUTOSAVE_DELAY};
use crate::error::GraphError;
use crate::executor::{ExecutionResult, ExecutorConfig, RunContext, WorkflowExecutor};
use crate::history::{HistoryInfo, HistoryState, HISTORY_LIMIT};
use crate::models::{Edge, ExecutionState, Node, Position, Workflow};
use crate::persistence::{self, BlobStore, WorkflowData, STORAGE_KEY};
use crate::sink::{lock_state, SharedExecutionState, StateSink};
use crate::validation::ValidationReport;
use crate::EngineError;

/// Where a node lands when the draft has no position.
const DEFAULT_POSITION: Position = Position { x: 100.0, y: 100.0 };

/// Offset applied to a duplicated node.
const DUPLICATE_OFFSET: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub executor: ExecutorConfig,
    pub history_limit: usize,
    pub autosave: bool,
    pub autosave_delay: Duration,
    pub storage_key: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            history_limit: HISTORY_LIMIT,
            autosave: true,
            autosave_delay: AUTOSAVE_DELAY,
            storage_key: STORAGE_KEY.to_owned(),
        }
    }
}

/// A node to be added; the controller assigns its ID.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    pub kind: NodeKind,
    pub label: String,
    pub icon: String,
    pub config: Map<String, Value>,
    pub position: Option<Position>,
}

impl NodeDraft {
    /// Draft of a built-in type with its icon and default config.
    pub fn of_type(node_type: NodeType) -> Self {
        Self {
            kind: node_type.kind(),
            label: node_type.label().to_owned(),
            icon: node_type.icon().to_owned(),
            config: node_type.default_config(),
            position: None,
        }
    }

    pub fn custom(kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            icon: String::new(),
            config: Map::new(),
            position: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    /// Merge the keys of a JSON object into the draft's config.
    pub fn with_config(mut self, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.config.extend(map);
        }
        self
    }
}

/// Partial node update. `config` keys are merged into the existing config.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub label: Option<String>,
    pub icon: Option<String>,
    pub config: Option<Map<String, Value>>,
}

/// Partial edge update for display metadata.
#[derive(Debug, Clone, Default)]
pub struct EdgeUpdate {
    pub label: Option<String>,
    pub edge_type: Option<String>,
    pub animated: Option<bool>,
}

fn generate_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

pub struct WorkflowController {
    config: ControllerConfig,
    workflow: Workflow,
    selected_node: Option<String>,
    history: HistoryState,
    execution: SharedExecutionState,
    executor: Arc<WorkflowExecutor>,
    store: Arc<dyn BlobStore>,
    autosave: AutosaveHandle,
}

impl WorkflowController {
    /// Controller with a simulated executor built from `config.executor`.
    pub fn new(store: Arc<dyn BlobStore>, config: ControllerConfig) -> Self {
        let executor = WorkflowExecutor::simulated(config.executor.clone());
        Self::with_executor(store, config, executor)
    }

    pub fn with_executor(
        store: Arc<dyn BlobStore>,
        config: ControllerConfig,
        executor: WorkflowExecutor,
    ) -> Self {
        let mut history = HistoryState::with_limit(config.history_limit);
        // The empty starting graph is the first undo target.
        history.record(HistoryState::snapshot(&[], &[]));

        Self {
            config,
            workflow: Workflow::default(),
            selected_node: None,
            history,
            execution: SharedExecutionState::default(),
            executor: Arc::new(executor),
            store,
            autosave: AutosaveHandle::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn nodes(&self) -> &[Node] {
        &self.workflow.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.workflow.edges
    }

    pub fn node_count(&self) -> usize {
        self.workflow.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.workflow.edges.len()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Recorded edits
    // -----------------------------------------------------------------------

    /// Snapshot the graph and schedule an autosave.
    fn commit(&mut self) {
        self.history
            .record(HistoryState::snapshot(&self.workflow.nodes, &self.workflow.edges));
        self.schedule_autosave();
    }

    fn schedule_autosave(&mut self) {
        if !self.config.autosave {
            return;
        }
        let data = WorkflowData::new(self.workflow.nodes.clone(), self.workflow.edges.clone());
        self.autosave.schedule(
            self.store.clone(),
            self.config.storage_key.clone(),
            data,
            self.config.autosave_delay,
        );
    }

    pub fn add_node(&mut self, draft: NodeDraft) -> Node {
        let node = Node {
            id: generate_id("node"),
            kind: draft.kind,
            label: draft.label,
            icon: draft.icon,
            config: draft.config,
            position: draft.position.unwrap_or(DEFAULT_POSITION),
        };
        debug!(node_id = %node.id, label = %node.label, "node added");
        self.workflow.nodes.push(node.clone());
        self.commit();
        node
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, node_id: &str) -> Result<Node, EngineError> {
        let index = self
            .workflow
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_owned()))?;

        let node = self.workflow.nodes.remove(index);
        self.workflow
            .edges
            .retain(|e| e.source != node_id && e.target != node_id);
        if self.selected_node.as_deref() == Some(node_id) {
            self.selected_node = None;
        }
        self.commit();
        Ok(node)
    }

    pub fn update_node(&mut self, node_id: &str, update: NodeUpdate) -> Result<(), EngineError> {
        let node = self
            .workflow
            .node_by_id_mut(node_id)
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_owned()))?;

        if let Some(label) = update.label {
            node.label = label;
        }
        if let Some(icon) = update.icon {
            node.icon = icon;
        }
        if let Some(config) = update.config {
            node.config.extend(config);
        }
        self.commit();
        Ok(())
    }

    /// Copy a node under a fresh ID, offset from the original.
    pub fn duplicate_node(&mut self, node_id: &str) -> Result<Node, EngineError> {
        let original = self
            .workflow
            .node_by_id(node_id)
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_owned()))?;

        let draft = NodeDraft {
            kind: original.kind,
            label: original.label.clone(),
            icon: original.icon.clone(),
            config: original.config.clone(),
            position: Some(Position::new(
                original.position.x + DUPLICATE_OFFSET,
                original.position.y + DUPLICATE_OFFSET,
            )),
        };
        Ok(self.add_node(draft))
    }

    /// Connect two existing nodes.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        label: Option<String>,
    ) -> Result<Edge, EngineError> {
        let mut edge = Edge::new(generate_id("edge"), source, target);
        edge.label = label;

        for (side, node_id) in [("source", source), ("target", target)] {
            if self.workflow.node_by_id(node_id).is_none() {
                return Err(GraphError::UnknownNodeReference {
                    edge_id: edge.id,
                    node_id: node_id.to_owned(),
                    side,
                }
                .into());
            }
        }

        self.workflow.edges.push(edge.clone());
        self.commit();
        Ok(edge)
    }

    pub fn remove_edge(&mut self, edge_id: &str) -> Result<Edge, EngineError> {
        let index = self
            .workflow
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or_else(|| EngineError::EdgeNotFound(edge_id.to_owned()))?;
        let edge = self.workflow.edges.remove(index);
        self.commit();
        Ok(edge)
    }

    /// Empty the graph and restart history from the empty graph.
    pub fn clear_workflow(&mut self) {
        self.workflow = Workflow::default();
        self.selected_node = None;
        self.history.clear();
        self.commit();
        info!("workflow cleared");
    }

    /// Replace the graph with an exported document.
    pub fn import_workflow(&mut self, json: &str) -> Result<(), EngineError> {
        let workflow = persistence::import_workflow_json(json)?;
        info!(
            nodes = workflow.nodes.len(),
            edges = workflow.edges.len(),
            "workflow imported"
        );
        self.replace_graph(workflow);
        Ok(())
    }

    /// Replace the graph with the saved one. Returns `false` when nothing
    /// usable is stored.
    pub async fn load_workflow(&mut self) -> Result<bool, EngineError> {
        let stored =
            persistence::load_workflow(self.store.as_ref(), &self.config.storage_key).await?;
        let Some(data) = stored else {
            return Ok(false);
        };
        info!(nodes = data.nodes.len(), edges = data.edges.len(), "workflow loaded");
        self.replace_graph(data.into_workflow());
        Ok(true)
    }

    fn replace_graph(&mut self, workflow: Workflow) {
        if self
            .selected_node
            .as_deref()
            .is_some_and(|id| workflow.node_by_id(id).is_none())
        {
            self.selected_node = None;
        }
        self.workflow = workflow;
        self.commit();
    }

    // -----------------------------------------------------------------------
    // Unrecorded edits
    // -----------------------------------------------------------------------

    /// Move a node. Dragging is not an undo step.
    pub fn update_node_position(
        &mut self,
        node_id: &str,
        x: f64,
        y: f64,
    ) -> Result<(), EngineError> {
        let node = self
            .workflow
            .node_by_id_mut(node_id)
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_owned()))?;
        node.position = Position::new(x, y);
        Ok(())
    }

    pub fn update_edge(&mut self, edge_id: &str, update: EdgeUpdate) -> Result<(), EngineError> {
        let edge = self
            .workflow
            .edges
            .iter_mut()
            .find(|e| e.id == edge_id)
            .ok_or_else(|| EngineError::EdgeNotFound(edge_id.to_owned()))?;

        if let Some(label) = update.label {
            edge.label = Some(label);
        }
        if let Some(edge_type) = update.edge_type {
            edge.edge_type = edge_type;
        }
        if let Some(animated) = update.animated {
            edge.animated = animated;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    pub fn select_node(&mut self, node_id: Option<&str>) -> Result<(), EngineError> {
        match node_id {
            Some(id) if self.workflow.node_by_id(id).is_none() => {
                Err(EngineError::NodeNotFound(id.to_owned()))
            }
            _ => {
                self.selected_node = node_id.map(str::to_owned);
                Ok(())
            }
        }
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.selected_node
            .as_deref()
            .and_then(|id| self.workflow.node_by_id(id))
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Restore the previous snapshot. Returns `false` at the oldest one.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(snapshot.into_workflow());
                true
            }
            None => false,
        }
    }

    /// Restore the next snapshot. Returns `false` at the newest one.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(snapshot.into_workflow());
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, workflow: Workflow) {
        self.workflow = workflow;
        if self
            .selected_node
            .as_deref()
            .is_some_and(|id| self.workflow.node_by_id(id).is_none())
        {
            self.selected_node = None;
        }
        self.schedule_autosave();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_info(&self) -> HistoryInfo {
        self.history.info()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Save now, superseding any pending autosave.
    pub async fn save_workflow(&mut self) -> Result<(), EngineError> {
        self.autosave.cancel();
        persistence::save_workflow(
            self.store.as_ref(),
            &self.config.storage_key,
            &self.workflow.nodes,
            &self.workflow.edges,
        )
        .await?;
        Ok(())
    }

    pub fn export_workflow(&self) -> Result<String, EngineError> {
        Ok(persistence::export_workflow_json(
            &self.workflow.nodes,
            &self.workflow.edges,
        )?)
    }

    /// Save a named (or timestamped) backup of the current graph.
    pub async fn create_backup(&self, name: Option<&str>) -> Result<String, EngineError> {
        Ok(persistence::create_backup(
            self.store.as_ref(),
            &self.config.storage_key,
            &self.workflow.nodes,
            &self.workflow.edges,
            name,
        )
        .await?)
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    pub fn validate_workflow(&self) -> ValidationReport {
        self.executor
            .validators()
            .validate_workflow(&self.workflow.nodes)
    }

    /// Run a copy of the current graph to completion.
    pub async fn start_execution(&self) -> ExecutionResult {
        let workflow = self.workflow.clone();
        let sink = StateSink::new(self.execution.clone());
        self.executor
            .start(RunContext {
                workflow: &workflow,
                state: &self.execution,
                sink: &sink,
            })
            .await
    }

    pub fn pause_execution(&self) {
        WorkflowExecutor::pause(&self.execution, &StateSink::new(self.execution.clone()));
    }

    pub fn resume_execution(&self) {
        WorkflowExecutor::resume(&self.execution, &StateSink::new(self.execution.clone()));
    }

    pub fn stop_execution(&self) {
        WorkflowExecutor::stop(&self.execution, &StateSink::new(self.execution.clone()));
    }

    pub fn clear_logs(&self) {
        lock_state(&self.execution).logs.clear();
    }

    /// Copy of the current execution state.
    pub fn execution_state(&self) -> ExecutionState {
        lock_state(&self.execution).clone()
    }

    pub fn is_running(&self) -> bool {
        lock_state(&self.execution).is_running
    }
}
