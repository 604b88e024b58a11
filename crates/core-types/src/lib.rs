//! Shared primitives for the procpilot procurement workflow.
//!
//! Everything the member crates exchange lives here: id newtypes, the
//! marketplace enumeration, the purchase demand and offer/recommendation
//! model, workflow status, and the shared error taxonomy.

mod error;
mod model;

pub use error::ProcureError;
pub use model::{
    Order, PurchaseDemand, RawOffer, Recommendation, SkuVariant, StepStatus, WorkflowStatus,
};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one procurement workflow.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one extracted offer (a listing on one platform).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

impl OfferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for OfferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported marketplaces. One adapter variant exists per platform;
/// adding a marketplace means adding a variant here plus its adapter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Alibaba1688,
    JdEnterprise,
    TmallSupermarket,
}

impl Platform {
    pub const ALL: [Platform; 3] = [
        Platform::Alibaba1688,
        Platform::JdEnterprise,
        Platform::TmallSupermarket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Alibaba1688 => "1688",
            Platform::JdEnterprise => "jd-enterprise",
            Platform::TmallSupermarket => "tmall-supermarket",
        }
    }

    /// Default trust ordering used as the final ranking tie-break:
    /// 1688 > JD > Tmall. Lower value wins.
    pub fn default_priority(&self) -> u8 {
        match self {
            Platform::Alibaba1688 => 0,
            Platform::JdEnterprise => 1,
            Platform::TmallSupermarket => 2,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ProcureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1688" | "alibaba" | "alibaba-1688" => Ok(Platform::Alibaba1688),
            "jd" | "jd-enterprise" => Ok(Platform::JdEnterprise),
            "tmall" | "tmall-supermarket" => Ok(Platform::TmallSupermarket),
            other => Err(ProcureError::InvalidDemand {
                reason: format!("unknown platform '{other}'"),
            }),
        }
    }
}
