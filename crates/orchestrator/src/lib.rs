//! Procurement workflow orchestration.
//!
//! Drives one demand through search, extraction, scoring, a suspended
//! confirmation gate and order execution. Every transition is checkpointed
//! through a [`JobStore`], so parked workflows survive restarts; progress
//! is observable through [`ProgressObserver`] without ever being load
//! bearing.

mod executor;
mod observer;
mod orchestrator;
mod state;
mod store;

pub use executor::{
    AdapterRevalidator, OfferQuote, OfferRevalidator, OrderExecutor, RevalidatingExecutor,
};
pub use observer::{
    ChannelObserver, CompositeObserver, ProgressEvent, ProgressObserver, TracingObserver,
};
pub use orchestrator::{default_adapters, OrchestratorConfig, WorkflowOrchestrator};
pub use state::{TransitionRecord, WorkflowReport, WorkflowState};
pub use store::{JobStore, JsonFileJobStore, MemoryJobStore};
