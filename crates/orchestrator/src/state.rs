//! Workflow state and the transition table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procpilot_core_types::{
    Order, ProcureError, PurchaseDemand, Recommendation, WorkflowId, WorkflowStatus,
};

/// One entry in the append-only transition history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Mutable state of one workflow. Single writer: the coordinating task (or
/// the approve/reject caller holding that workflow's lock).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub demand: PurchaseDemand,
    pub status: WorkflowStatus,
    pub recommendations: Vec<Recommendation>,
    pub selected: Option<Recommendation>,
    pub order: Option<Order>,
    pub error: Option<String>,
    /// Absolute expiry of the approval window, set when parking.
    pub confirmation_deadline: Option<DateTime<Utc>>,
    pub history: Vec<TransitionRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(demand: PurchaseDemand) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: WorkflowId::new(),
            demand,
            status: WorkflowStatus::Initialized,
            recommendations: Vec::new(),
            selected: None,
            order: None,
            error: None,
            confirmation_deadline: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Legal stage changes. `Failed` is reachable from any non-terminal
    /// stage; everything else follows the pipeline order.
    fn allowed(from: WorkflowStatus, to: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        if from.is_terminal() {
            return false;
        }
        match (from, to) {
            (_, Failed) => true,
            (Initialized, Searching) => true,
            (Searching, Extracting) => true,
            (Extracting, Scoring) => true,
            (Scoring, PendingConfirmation) => true,
            (PendingConfirmation, Ordering) => true,
            (Ordering, Completed) => true,
            _ => false,
        }
    }

    /// Apply a stage change, appending to history. The caller is
    /// responsible for checkpointing afterwards.
    pub fn transition(
        &mut self,
        to: WorkflowStatus,
        note: Option<String>,
    ) -> Result<(), ProcureError> {
        if !Self::allowed(self.status, to) {
            return Err(ProcureError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        let now = Utc::now();
        self.history.push(TransitionRecord {
            from: self.status,
            to,
            at: now,
            note,
        });
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Mark the workflow failed with a captured, human-readable error.
    pub fn fail(&mut self, error: &ProcureError) -> Result<(), ProcureError> {
        self.transition(
            WorkflowStatus::Failed,
            Some(error.reason_code().to_string()),
        )?;
        self.error = Some(error.to_string());
        Ok(())
    }

    pub fn report(&self) -> WorkflowReport {
        WorkflowReport {
            status: self.status,
            workflow_id: self.workflow_id.clone(),
            recommendations: self.recommendations.clone(),
            order: self.order.clone(),
            error: self.error.clone(),
        }
    }
}

/// The externally visible outcome of a workflow call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub status: WorkflowStatus,
    pub workflow_id: WorkflowId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use procpilot_core_types::Platform;

    fn state() -> WorkflowState {
        WorkflowState::new(
            PurchaseDemand::new("A4 paper", 10, vec![Platform::Alibaba1688]).unwrap(),
        )
    }

    #[test]
    fn pipeline_order_is_enforced() {
        let mut s = state();
        s.transition(WorkflowStatus::Searching, None).unwrap();
        s.transition(WorkflowStatus::Extracting, None).unwrap();
        s.transition(WorkflowStatus::Scoring, None).unwrap();
        s.transition(WorkflowStatus::PendingConfirmation, None)
            .unwrap();
        s.transition(WorkflowStatus::Ordering, None).unwrap();
        s.transition(WorkflowStatus::Completed, None).unwrap();
        assert_eq!(s.history.len(), 6);
    }

    #[test]
    fn ordering_requires_pending_confirmation() {
        let mut s = state();
        s.transition(WorkflowStatus::Searching, None).unwrap();
        let err = s.transition(WorkflowStatus::Ordering, None).unwrap_err();
        assert!(matches!(err, ProcureError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_states_are_final() {
        let mut s = state();
        s.fail(&ProcureError::NoCandidatesFound).unwrap();
        assert_eq!(s.status, WorkflowStatus::Failed);
        assert!(s.error.is_some());
        assert!(s.transition(WorkflowStatus::Searching, None).is_err());
        assert!(s.transition(WorkflowStatus::Failed, None).is_err());
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut s = state();
        s.transition(WorkflowStatus::Searching, Some("start".into()))
            .unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, WorkflowStatus::Searching);
        assert_eq!(back.history.len(), 1);
        assert_eq!(back.workflow_id, s.workflow_id);
    }
}
