//! Progress observation.
//!
//! Observers receive step events as the workflow moves; a failing observer
//! never fails the workflow. Events are best-effort, state checkpoints are
//! the source of truth.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use procpilot_core_types::{ProcureError, StepStatus, WorkflowId, WorkflowStatus};

/// One progress event, emitted on stage changes and notable intra-stage
/// moments (a platform finishing, an offer dropped).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub workflow_id: WorkflowId,
    pub stage: WorkflowStatus,
    pub step: StepStatus,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        workflow_id: &WorkflowId,
        stage: WorkflowStatus,
        step: StepStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.clone(),
            stage,
            step,
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_event(&self, event: &ProgressEvent) -> Result<(), ProcureError>;
}

/// Logs every event through `tracing`. The default observer.
#[derive(Default)]
pub struct TracingObserver;

#[async_trait]
impl ProgressObserver for TracingObserver {
    async fn on_event(&self, event: &ProgressEvent) -> Result<(), ProcureError> {
        info!(
            target: "workflow",
            workflow_id = %event.workflow_id,
            stage = event.stage.as_str(),
            step = event.step.as_str(),
            "{}",
            event.detail
        );
        Ok(())
    }
}

/// Forwards events over a channel, for UIs that render progress live.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressObserver for ChannelObserver {
    async fn on_event(&self, event: &ProgressEvent) -> Result<(), ProcureError> {
        self.tx
            .send(event.clone())
            .map_err(|_| ProcureError::Internal("progress channel closed".into()))
    }
}

/// Fans one event out to several observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }
}

#[async_trait]
impl ProgressObserver for CompositeObserver {
    async fn on_event(&self, event: &ProgressEvent) -> Result<(), ProcureError> {
        for observer in &self.observers {
            if let Err(e) = observer.on_event(event).await {
                warn!(target: "workflow", error = %e, "progress observer failed");
            }
        }
        Ok(())
    }
}

/// Emit an event, absorbing observer failures.
pub(crate) async fn emit(
    observer: &dyn ProgressObserver,
    workflow_id: &WorkflowId,
    stage: WorkflowStatus,
    step: StepStatus,
    detail: impl Into<String>,
) {
    let event = ProgressEvent::new(workflow_id, stage, step, detail);
    if let Err(e) = observer.on_event(&event).await {
        warn!(target: "workflow", error = %e, "progress observer failed");
    }
}
