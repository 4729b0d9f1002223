//! Core domain models for the workflow editor and its engines.
//!
//! These types are the source of truth for what a workflow looks like
//! in memory. They serialise to the persisted/exported JSON shape
//! (`{ nodes: [{id, kind, label, config, position}], edges: [...] }`).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use nodes::{NodeKind, NodeType};

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// 2D layout coordinate. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A single step in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    pub kind: NodeKind,
    /// Step type name ("Email", "Condition", "End"); also the validator key.
    pub label: String,
    #[serde(default)]
    pub icon: String,
    /// Open configuration mapping; its shape depends on `label`.
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub position: Position,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            icon: String::new(),
            config: Map::new(),
            position: Position::default(),
        }
    }

    /// A node of a built-in type, carrying that type's icon and default config.
    pub fn of_type(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            kind: node_type.kind(),
            label: node_type.label().to_owned(),
            icon: node_type.icon().to_owned(),
            config: node_type.default_config(),
            position: Position::default(),
        }
    }

    /// Merge the keys of a JSON object into `config`. Non-objects are ignored.
    pub fn with_config(mut self, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.config.extend(map);
        }
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    /// The built-in type this node's label resolves to, if any.
    pub fn node_type(&self) -> Option<NodeType> {
        NodeType::from_label(&self.label)
    }

    pub fn is_trigger(&self) -> bool {
        self.kind == NodeKind::Trigger
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

fn default_edge_type() -> String {
    "smoothstep".to_owned()
}

fn default_animated() -> bool {
    true
}

/// Directed edge from one node to another.
///
/// `label`, `edge_type` and `animated` are display metadata and never
/// affect traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,
    #[serde(default = "default_animated")]
    pub animated: bool,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
            edge_type: default_edge_type(),
            animated: default_animated(),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// The live graph: nodes and edges, in insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Workflow {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

// ---------------------------------------------------------------------------
// WorkflowSnapshot
// ---------------------------------------------------------------------------

/// Immutable deep copy of `(nodes, edges)` at one point in time.
///
/// Fields are private: once captured, a snapshot can only be read or
/// consumed, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl WorkflowSnapshot {
    /// Copy both collections. Nothing is shared with the caller's graph.
    pub fn capture(nodes: &[Node], edges: &[Edge]) -> Self {
        Self {
            nodes: nodes.to_vec(),
            edges: edges.to_vec(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn into_workflow(self) -> Workflow {
        Workflow {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

impl From<&Workflow> for WorkflowSnapshot {
    fn from(workflow: &Workflow) -> Self {
        Self::capture(&workflow.nodes, &workflow.edges)
    }
}

// ---------------------------------------------------------------------------
// Execution state
// ---------------------------------------------------------------------------

/// Per-node status within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Error,
    Skipped,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Error,
    Warning,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn now(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Observable state of the current (or last) run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub is_running: bool,
    pub is_paused: bool,
    pub current_node_id: Option<String>,
    pub logs: Vec<LogEntry>,
    pub node_statuses: BTreeMap<String, NodeStatus>,
    /// The run that owns this state, from `start` until it has unwound.
    /// `stop` clears `is_running` but leaves this set, so a stopped run
    /// still holds the state while it finishes its current node.
    #[serde(default)]
    pub run_id: Option<Uuid>,
}

impl ExecutionState {
    /// Fresh state for run `run_id`: logs and statuses cleared, running.
    pub fn begin_run(&mut self, run_id: Uuid) {
        *self = Self {
            is_running: true,
            run_id: Some(run_id),
            ..Self::default()
        };
    }

    /// Release the state held by `run_id`, keeping logs and statuses for
    /// inspection. A no-op for any other run.
    pub fn end_run(&mut self, run_id: Uuid) {
        if self.run_id != Some(run_id) {
            return;
        }
        self.run_id = None;
        self.is_running = false;
        self.is_paused = false;
        self.current_node_id = None;
    }

    /// A run is in progress or a stopped run has not unwound yet.
    pub fn is_occupied(&self) -> bool {
        self.is_running || self.run_id.is_some()
    }

    /// `run_id` owns the state and has not been stopped.
    pub fn is_active(&self, run_id: Uuid) -> bool {
        self.is_running && self.run_id == Some(run_id)
    }

    pub fn status_of(&self, node_id: &str) -> Option<NodeStatus> {
        self.node_statuses.get(node_id).copied()
    }
}
