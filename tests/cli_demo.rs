//! End-to-end run over the demo marketplaces and a file-backed store.

use std::sync::Arc;

use rust_decimal::Decimal;

use procpilot_cli::demo::demo_factory;
use procpilot_core_types::{Platform, PurchaseDemand, WorkflowStatus};
use procpilot_orchestrator::{JsonFileJobStore, WorkflowOrchestrator};

#[tokio::test]
async fn demo_marketplaces_carry_a_demand_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileJobStore::new(dir.path()).unwrap());
    let orchestrator = WorkflowOrchestrator::new(demo_factory(), store.clone());

    let demand = PurchaseDemand::new("A4 paper", 10, Platform::ALL.to_vec())
        .unwrap()
        .with_specification("80g")
        .with_budget(Decimal::new(600, 0));
    let parked = orchestrator.run_workflow(demand).await.unwrap();
    assert_eq!(parked.status, WorkflowStatus::PendingConfirmation);
    assert!(!parked.recommendations.is_empty());
    assert!(parked.recommendations.len() <= 3);

    // The gate survives an orchestrator restart over the same state dir.
    let revived = WorkflowOrchestrator::new(demo_factory(), store);
    let report = revived.approve(&parked.workflow_id, 1).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Completed);
    let order = report.order.unwrap();
    assert!(order.payment_amount > Decimal::ZERO);
}
