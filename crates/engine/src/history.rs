//! Bounded, linear undo/redo over whole-graph snapshots.
//!
//! Every mutating edit records one [`WorkflowSnapshot`]. Recording after an
//! undo discards the redo branch. When more than the configured limit are
//! stored, the oldest snapshot is evicted.
//!
//! Snapshots are copied in and copied out: the history never hands out a
//! reference a caller could mutate.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::models::{Edge, Node, WorkflowSnapshot};

/// Default maximum number of retained snapshots.
pub const HISTORY_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// HistoryState
// ---------------------------------------------------------------------------

/// Snapshot stack plus a cursor.
///
/// Invariant: `current` is `None` iff `snapshots` is empty, otherwise it
/// indexes into `snapshots`.
#[derive(Debug, Clone)]
pub struct HistoryState {
    snapshots: VecDeque<WorkflowSnapshot>,
    current: Option<usize>,
    limit: usize,
}

impl Default for HistoryState {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryState {
    pub fn new() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }

    /// History bounded to `limit` snapshots (at least one).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            current: None,
            limit: limit.max(1),
        }
    }

    /// Deep-copy the live graph. Does not touch history.
    pub fn snapshot(nodes: &[Node], edges: &[Edge]) -> WorkflowSnapshot {
        WorkflowSnapshot::capture(nodes, edges)
    }

    /// Append `snapshot` and make it current, truncating any redo branch
    /// and evicting the oldest entry past the limit.
    pub fn record(&mut self, snapshot: WorkflowSnapshot) {
        match self.current {
            Some(index) => self.snapshots.truncate(index + 1),
            None => self.snapshots.clear(),
        }

        self.snapshots.push_back(snapshot);
        if self.snapshots.len() > self.limit {
            self.snapshots.pop_front();
        }
        self.current = Some(self.snapshots.len() - 1);

        debug!(
            current = self.snapshots.len() - 1,
            total = self.snapshots.len(),
            "recorded snapshot"
        );
    }

    /// Step back one snapshot and return a copy of it; `None` at the oldest.
    pub fn undo(&mut self) -> Option<WorkflowSnapshot> {
        let index = self.current.filter(|&i| i > 0)? - 1;
        self.current = Some(index);
        self.snapshots.get(index).cloned()
    }

    /// Step forward one snapshot and return a copy of it; `None` at the newest.
    pub fn redo(&mut self) -> Option<WorkflowSnapshot> {
        let index = self.current? + 1;
        if index >= self.snapshots.len() {
            return None;
        }
        self.current = Some(index);
        self.snapshots.get(index).cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.current.is_some_and(|i| i > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.current.is_some_and(|i| i + 1 < self.snapshots.len())
    }

    /// Reset to the empty initial state.
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current = None;
    }

    /// Cursor position; `None` when empty.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Copy of the snapshot the cursor points at.
    pub fn current(&self) -> Option<WorkflowSnapshot> {
        self.current.and_then(|i| self.snapshots.get(i)).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Keep only the `keep` newest snapshots. The cursor stays on its
    /// snapshot when that one is kept, otherwise it moves to the oldest kept.
    pub fn optimize(&mut self, keep: usize) {
        let keep = keep.max(1);
        if self.snapshots.len() <= keep {
            return;
        }
        let dropped = self.snapshots.len() - keep;
        self.snapshots.drain(..dropped);
        self.current = self.current.map(|i| i.saturating_sub(dropped));
    }

    pub fn info(&self) -> HistoryInfo {
        let bytes: usize = self
            .snapshots
            .iter()
            .map(|s| serde_json::to_vec(s).map(|v| v.len()).unwrap_or(0))
            .sum();

        HistoryInfo {
            current_index: self.current,
            total_snapshots: self.snapshots.len(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            memory_usage_kb: bytes as f64 / 1024.0,
        }
    }
}

/// Summary of the history for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryInfo {
    pub current_index: Option<usize>,
    pub total_snapshots: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub memory_usage_kb: f64,
}

impl HistoryInfo {
    pub fn memory_usage(&self) -> String {
        format!("{:.2} KB", self.memory_usage_kb)
    }
}

// ---------------------------------------------------------------------------
// Snapshot diff
// ---------------------------------------------------------------------------

/// Counts of what changed between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDiff {
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub nodes_modified: usize,
    pub edges_added: usize,
    pub edges_removed: usize,
}

pub fn compare_snapshots(old: &WorkflowSnapshot, new: &WorkflowSnapshot) -> SnapshotDiff {
    let old_nodes: HashSet<&str> = old.nodes().iter().map(|n| n.id.as_str()).collect();
    let new_nodes: HashSet<&str> = new.nodes().iter().map(|n| n.id.as_str()).collect();
    let old_edges: HashSet<&str> = old.edges().iter().map(|e| e.id.as_str()).collect();
    let new_edges: HashSet<&str> = new.edges().iter().map(|e| e.id.as_str()).collect();

    let nodes_modified = old
        .nodes()
        .iter()
        .filter(|before| {
            new.nodes()
                .iter()
                .find(|after| after.id == before.id)
                .is_some_and(|after| after != *before)
        })
        .count();

    SnapshotDiff {
        nodes_added: new_nodes.difference(&old_nodes).count(),
        nodes_removed: old_nodes.difference(&new_nodes).count(),
        nodes_modified,
        edges_added: new_edges.difference(&old_edges).count(),
        edges_removed: old_edges.difference(&new_edges).count(),
    }
}

/// e.g. `"+1 node(s), -2 edge(s)"`, or `"No changes"`.
pub fn change_description(old: &WorkflowSnapshot, new: &WorkflowSnapshot) -> String {
    let diff = compare_snapshots(old, new);
    let parts: Vec<String> = [
        (diff.nodes_added, "+", "node"),
        (diff.nodes_removed, "-", "node"),
        (diff.nodes_modified, "~", "node"),
        (diff.edges_added, "+", "edge"),
        (diff.edges_removed, "-", "edge"),
    ]
    .into_iter()
    .filter(|(count, _, _)| *count > 0)
    .map(|(count, sign, what)| format!("{sign}{count} {what}(s)"))
    .collect();

    if parts.is_empty() {
        "No changes".to_owned()
    } else {
        parts.join(", ")
    }
}
