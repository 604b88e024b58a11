use thiserror::Error;

use crate::Platform;

/// Shared error taxonomy for the procurement workflow.
///
/// Local errors (`ExtractionFailed`, `PlatformUnavailable`) are absorbed and
/// recorded by the orchestrator; they only become a workflow failure when
/// they eliminate every candidate. Everything else is terminal for the
/// workflow that raised it.
#[derive(Debug, Error, Clone)]
pub enum ProcureError {
    /// Selector chain exhausted for one offer. Scoped to that offer.
    #[error("extraction failed on {platform}: {reason}")]
    ExtractionFailed { platform: Platform, reason: String },

    /// Login wall or navigation timeout for one platform. Scoped to that
    /// platform.
    #[error("platform {platform} unavailable: {reason}")]
    PlatformUnavailable { platform: Platform, reason: String },

    /// Every platform failed or returned zero offers.
    #[error("no candidates found on any platform")]
    NoCandidatesFound,

    /// Re-validated price drifted beyond tolerance at order time.
    #[error("price changed on {platform}: snapshot {snapshot}, current {current}")]
    PriceChanged {
        platform: Platform,
        snapshot: rust_decimal::Decimal,
        current: rust_decimal::Decimal,
    },

    /// Stock gone at order time.
    #[error("offer out of stock on {platform}")]
    OutOfStock { platform: Platform },

    /// Approval window expired while parked in pending_confirmation.
    #[error("confirmation window expired")]
    ConfirmationTimeout,

    /// Explicit human rejection.
    #[error("recommendation rejected")]
    Rejected,

    #[error("invalid demand: {reason}")]
    InvalidDemand { reason: String },

    /// Requested stage change is not in the transition table.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("workflow {0} not found")]
    WorkflowNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcureError {
    /// Local failures are absorbed per offer / per platform instead of
    /// failing the workflow.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ProcureError::ExtractionFailed { .. } | ProcureError::PlatformUnavailable { .. }
        )
    }

    /// Short machine-readable tag used in reports and transition history.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ProcureError::ExtractionFailed { .. } => "extraction_failed",
            ProcureError::PlatformUnavailable { .. } => "platform_unavailable",
            ProcureError::NoCandidatesFound => "no_candidates_found",
            ProcureError::PriceChanged { .. } => "price_changed",
            ProcureError::OutOfStock { .. } => "out_of_stock",
            ProcureError::ConfirmationTimeout => "confirmation_timeout",
            ProcureError::Rejected => "rejected",
            ProcureError::InvalidDemand { .. } => "invalid_demand",
            ProcureError::InvalidTransition { .. } => "invalid_transition",
            ProcureError::WorkflowNotFound(_) => "workflow_not_found",
            ProcureError::Storage(_) => "storage",
            ProcureError::Internal(_) => "internal",
        }
    }
}
