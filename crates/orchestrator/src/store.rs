//! Workflow persistence.
//!
//! Every transition is checkpointed before control returns to the caller,
//! so a parked workflow survives a process restart. Checkpoint failures are
//! strict: a workflow whose state cannot be saved must not keep running.

use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use procpilot_core_types::{ProcureError, WorkflowId};

use crate::state::WorkflowState;

/// Durable (or in-memory) storage for workflow state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist the full state, replacing any previous checkpoint.
    async fn checkpoint(&self, state: &WorkflowState) -> Result<(), ProcureError>;

    async fn load(&self, workflow_id: &WorkflowId) -> Result<WorkflowState, ProcureError>;

    async fn list(&self) -> Result<Vec<WorkflowId>, ProcureError>;
}

/// Process-local store. Default for tests and the demo mode.
#[derive(Default)]
pub struct MemoryJobStore {
    states: DashMap<WorkflowId, WorkflowState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn checkpoint(&self, state: &WorkflowState) -> Result<(), ProcureError> {
        self.states
            .insert(state.workflow_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, workflow_id: &WorkflowId) -> Result<WorkflowState, ProcureError> {
        self.states
            .get(workflow_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ProcureError::WorkflowNotFound(workflow_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<WorkflowId>, ProcureError> {
        Ok(self.states.iter().map(|e| e.key().clone()).collect())
    }
}

/// One JSON file per workflow under a base directory. Good enough for a
/// single-node deployment; the trait is the seam for anything heavier.
pub struct JsonFileJobStore {
    base_dir: PathBuf,
}

impl JsonFileJobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, ProcureError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .map_err(|e| ProcureError::Storage(format!("create {}: {e}", base_dir.display())))?;
        Ok(Self { base_dir })
    }

    fn path_for(&self, workflow_id: &WorkflowId) -> PathBuf {
        self.base_dir.join(format!("{workflow_id}.json"))
    }
}

#[async_trait]
impl JobStore for JsonFileJobStore {
    async fn checkpoint(&self, state: &WorkflowState) -> Result<(), ProcureError> {
        let path = self.path_for(&state.workflow_id);
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| ProcureError::Storage(format!("serialize workflow: {e}")))?;
        // Write-then-rename so a crash mid-write never leaves a torn
        // checkpoint behind.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| ProcureError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ProcureError::Storage(format!("rename {}: {e}", path.display())))?;
        debug!(target: "store", workflow_id = %state.workflow_id, status = %state.status, "checkpointed");
        Ok(())
    }

    async fn load(&self, workflow_id: &WorkflowId) -> Result<WorkflowState, ProcureError> {
        let path = self.path_for(workflow_id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcureError::WorkflowNotFound(workflow_id.to_string())
            } else {
                ProcureError::Storage(format!("read {}: {e}", path.display()))
            }
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ProcureError::Storage(format!("parse {}: {e}", path.display())))
    }

    async fn list(&self) -> Result<Vec<WorkflowId>, ProcureError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| ProcureError::Storage(format!("list {}: {e}", self.base_dir.display())))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProcureError::Storage(format!("list {}: {e}", self.base_dir.display())))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                ids.push(WorkflowId(stem.to_string()));
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procpilot_core_types::{Platform, PurchaseDemand, WorkflowStatus};

    fn state() -> WorkflowState {
        WorkflowState::new(
            PurchaseDemand::new("A4 paper", 10, vec![Platform::Alibaba1688]).unwrap(),
        )
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryJobStore::new();
        let s = state();
        store.checkpoint(&s).await.unwrap();
        let loaded = store.load(&s.workflow_id).await.unwrap();
        assert_eq!(loaded.status, WorkflowStatus::Initialized);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_workflow_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store.load(&WorkflowId::new()).await.unwrap_err();
        assert!(matches!(err, ProcureError::WorkflowNotFound(_)));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state();
        s.transition(WorkflowStatus::Searching, None).unwrap();
        {
            let store = JsonFileJobStore::new(dir.path()).unwrap();
            store.checkpoint(&s).await.unwrap();
        }
        let store = JsonFileJobStore::new(dir.path()).unwrap();
        let loaded = store.load(&s.workflow_id).await.unwrap();
        assert_eq!(loaded.status, WorkflowStatus::Searching);
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(store.list().await.unwrap(), vec![s.workflow_id.clone()]);
    }

    #[tokio::test]
    async fn checkpoint_replaces_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileJobStore::new(dir.path()).unwrap();
        let mut s = state();
        store.checkpoint(&s).await.unwrap();
        s.transition(WorkflowStatus::Searching, None).unwrap();
        store.checkpoint(&s).await.unwrap();
        let loaded = store.load(&s.workflow_id).await.unwrap();
        assert_eq!(loaded.status, WorkflowStatus::Searching);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
