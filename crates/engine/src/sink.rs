//! Output channel of the executor.
//!
//! The executor reports progress only through an [`ExecutionSink`]. The
//! stock [`StateSink`] folds reports into a shared [`ExecutionState`] and
//! mirrors every log line to `tracing`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use crate::models::{ExecutionState, LogEntry, LogKind, NodeStatus};

/// Execution state shared between the controller, the executor and sinks.
pub type SharedExecutionState = Arc<Mutex<ExecutionState>>;

/// Lock the shared state. A poisoned lock is recovered: the state is plain
/// data and stays meaningful after a panicking writer.
pub fn lock_state(state: &SharedExecutionState) -> MutexGuard<'_, ExecutionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receives log lines and node status transitions from a run.
pub trait ExecutionSink: Send + Sync {
    fn on_log(&self, kind: LogKind, message: String);
    fn on_status_change(&self, node_id: &str, status: NodeStatus);
}

/// Sink that writes into a [`SharedExecutionState`].
#[derive(Debug, Clone)]
pub struct StateSink {
    state: SharedExecutionState,
}

impl StateSink {
    pub fn new(state: SharedExecutionState) -> Self {
        Self { state }
    }
}

impl ExecutionSink for StateSink {
    fn on_log(&self, kind: LogKind, message: String) {
        match kind {
            LogKind::Info | LogKind::Success => info!(target: "engine::run", "{message}"),
            LogKind::Warning => warn!(target: "engine::run", "{message}"),
            LogKind::Error => error!(target: "engine::run", "{message}"),
        }
        lock_state(&self.state).logs.push(LogEntry::now(kind, message));
    }

    fn on_status_change(&self, node_id: &str, status: NodeStatus) {
        let mut state = lock_state(&self.state);
        state.node_statuses.insert(node_id.to_owned(), status);
        if status == NodeStatus::Running {
            state.current_node_id = Some(node_id.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_sink_records_logs_and_statuses() {
        let state = SharedExecutionState::default();
        let sink = StateSink::new(state.clone());

        sink.on_log(LogKind::Info, "hello".into());
        sink.on_status_change("a", NodeStatus::Running);
        sink.on_status_change("a", NodeStatus::Success);

        let state = lock_state(&state);
        assert_eq!(state.logs.len(), 1);
        assert_eq!(state.logs[0].kind, LogKind::Info);
        assert_eq!(state.logs[0].message, "hello");
        assert_eq!(state.status_of("a"), Some(NodeStatus::Success));
        assert_eq!(state.current_node_id.as_deref(), Some("a"));
    }
}
