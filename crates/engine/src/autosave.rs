//! Debounced background save.
//!
//! Each `schedule` call replaces the pending save, so a burst of edits
//! results in one write `delay` after the last of them.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::persistence::{save_workflow_data, BlobStore, WorkflowData};

/// Delay between the last edit and the autosave write.
pub const AUTOSAVE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Default)]
pub struct AutosaveHandle {
    pending: Option<JoinHandle<()>>,
}

impl AutosaveHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending save and schedule `data` to be written after
    /// `delay`. Outside a tokio runtime nothing is scheduled.
    pub fn schedule(
        &mut self,
        store: Arc<dyn BlobStore>,
        key: impl Into<String>,
        data: WorkflowData,
        delay: Duration,
    ) {
        self.cancel();

        let Ok(runtime) = Handle::try_current() else {
            debug!("no tokio runtime; autosave skipped");
            return;
        };

        let key = key.into();
        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            match save_workflow_data(store.as_ref(), &key, &data).await {
                Ok(()) => debug!(key = %key, "autosaved workflow"),
                Err(err) => warn!(key = %key, "autosave failed: {err}"),
            }
        }));
    }

    /// Drop the pending save, if any. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    /// A save is scheduled and has not finished yet.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
