//! Execution state store.
//!
//! In-memory, keyed by execution id. The executor registers a run at
//! submission and writes back a full snapshot after each node, so
//! readers always see a consistent record. Finished executions are
//! evicted once they age past the configured retention window.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use weft_core::error::Result;
use weft_core::execution::WorkflowExecution;
use weft_core::traits::WorkflowStore;
use weft_core::types::ExecutionId;
use weft_core::workflow::Workflow;

struct StoredExecution {
    execution: WorkflowExecution,
    cancel: CancellationToken,
}

/// Shared store of workflow executions, live and finished.
#[derive(Default)]
pub struct ExecutionStore {
    entries: Mutex<HashMap<ExecutionId, StoredExecution>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run and hand back the token the executor should
    /// observe at every suspension point.
    pub fn register(&self, execution: &WorkflowExecution) -> CancellationToken {
        let cancel = CancellationToken::new();
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.insert(
            execution.id.clone(),
            StoredExecution {
                execution: execution.clone(),
                cancel: cancel.clone(),
            },
        );
        cancel
    }

    /// Write back the current snapshot of a run. Unknown ids are ignored
    /// (the entry may have been evicted).
    pub fn update(&self, execution: &WorkflowExecution) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        if let Some(entry) = entries.get_mut(&execution.id) {
            entry.execution = execution.clone();
        }
    }

    pub fn get(&self, id: &ExecutionId) -> Option<WorkflowExecution> {
        let entries = self.entries.lock().expect("store lock poisoned");
        entries.get(id).map(|e| e.execution.clone())
    }

    /// Request cancellation of a run. Returns false when the id is
    /// unknown. Cancelling a finished run is a no-op.
    pub fn cancel(&self, id: &ExecutionId) -> bool {
        let entries = self.entries.lock().expect("store lock poisoned");
        match entries.get(id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop finished executions older than `retention_secs`. Running
    /// executions are never evicted.
    pub fn evict_finished(&self, retention_secs: u64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(retention_secs as i64);
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| match entry.execution.finished_at {
            Some(finished) => finished > cutoff,
            None => true,
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted finished executions past retention");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory workflow persistence.
#[derive(Default)]
pub struct MemoryWorkflowStore {
    workflows: Mutex<HashMap<String, Workflow>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStore for MemoryWorkflowStore {
    fn save(&self, workflow: Workflow) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut workflows = self.workflows.lock().expect("store lock poisoned");
            workflows.insert(workflow.id.clone(), workflow);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, Result<Option<Workflow>>> {
        let id = id.to_string();
        Box::pin(async move {
            let workflows = self.workflows.lock().expect("store lock poisoned");
            Ok(workflows.get(&id).cloned())
        })
    }
}
