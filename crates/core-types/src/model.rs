use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OfferId, Platform, ProcureError, WorkflowId};

/// A purchase demand as submitted by the buyer. Immutable once a workflow
/// starts; the workflow keeps its own owned copy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseDemand {
    pub product_name: String,
    pub specification: Option<String>,
    pub quantity: u32,
    pub budget: Option<Decimal>,
    pub preferred_platforms: Vec<Platform>,
    pub additional_requirements: Option<String>,
}

impl PurchaseDemand {
    /// Validated constructor: non-empty product name, positive quantity,
    /// at least one preferred platform.
    pub fn new(
        product_name: impl Into<String>,
        quantity: u32,
        preferred_platforms: Vec<Platform>,
    ) -> Result<Self, ProcureError> {
        let product_name = product_name.into();
        if product_name.trim().is_empty() {
            return Err(ProcureError::InvalidDemand {
                reason: "product_name must not be empty".into(),
            });
        }
        if quantity == 0 {
            return Err(ProcureError::InvalidDemand {
                reason: "quantity must be positive".into(),
            });
        }
        if preferred_platforms.is_empty() {
            return Err(ProcureError::InvalidDemand {
                reason: "at least one preferred platform is required".into(),
            });
        }
        Ok(Self {
            product_name,
            specification: None,
            quantity,
            budget: None,
            preferred_platforms,
            additional_requirements: None,
        })
    }

    pub fn with_specification(mut self, spec: impl Into<String>) -> Self {
        self.specification = Some(spec.into());
        self
    }

    pub fn with_budget(mut self, budget: Decimal) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_additional_requirements(mut self, req: impl Into<String>) -> Self {
        self.additional_requirements = Some(req.into());
        self
    }
}

/// One purchasable configuration of an offer (e.g. a colour/size combo).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkuVariant {
    pub label: String,
    pub price: Option<Decimal>,
    pub in_stock: bool,
}

/// A raw offer extracted from one marketplace listing. Produced by a
/// platform adapter, consumed by the scorer; only the fields copied into a
/// `Recommendation` outlive scoring.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawOffer {
    pub offer_id: OfferId,
    pub platform: Platform,
    pub title: String,
    pub detail_url: String,
    pub unit_price: Decimal,
    pub freight: Decimal,
    pub min_quantity: u32,
    pub variants: Vec<SkuVariant>,
    /// Selector that produced the variant extraction, when one matched.
    pub matched_selector: Option<String>,
    /// Extraction confidence in 0.0..=1.0; listing-only offers keep the
    /// confidence of the search-result extraction.
    pub confidence: f64,
}

impl RawOffer {
    pub fn landed_cost(&self, quantity: u32) -> Decimal {
        self.unit_price * Decimal::from(quantity) + self.freight
    }
}

/// A ranked, scored recommendation presented at the confirmation gate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1..N, contiguous and unique within one workflow.
    pub rank: u32,
    pub offer_id: OfferId,
    pub platform: Platform,
    pub product_name: String,
    pub detail_url: String,
    pub unit_price: Decimal,
    pub freight: Decimal,
    pub landed_cost: Decimal,
    pub total_score: f64,
    pub reason: String,
}

/// The committed purchase. Created only by the order executor, exactly once
/// per workflow, only after explicit approval.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub workflow_id: WorkflowId,
    pub platform: Platform,
    pub payment_amount: Decimal,
    pub placed_at: DateTime<Utc>,
}

/// Workflow stages. Terminal once Completed or Failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initialized,
    Searching,
    Extracting,
    Scoring,
    PendingConfirmation,
    Ordering,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Initialized => "initialized",
            WorkflowStatus::Searching => "searching",
            WorkflowStatus::Extracting => "extracting",
            WorkflowStatus::Scoring => "scoring",
            WorkflowStatus::PendingConfirmation => "pending_confirmation",
            WorkflowStatus::Ordering => "ordering",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status attached to each progress event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
    Warning,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Warning => "warning",
        }
    }
}
