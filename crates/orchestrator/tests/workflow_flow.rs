//! End-to-end workflow runs over scripted browser sessions.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use platform_adapter::fixtures::{detail_page, search_page, ScriptedFactory, SessionScript};
use procpilot_core_types::{Platform, ProcureError, PurchaseDemand, WorkflowId, WorkflowStatus};
use procpilot_orchestrator::{
    ChannelObserver, JobStore, MemoryJobStore, OrchestratorConfig, WorkflowOrchestrator,
    WorkflowState,
};

fn demand() -> PurchaseDemand {
    PurchaseDemand::new(
        "A4 paper",
        10,
        vec![Platform::Alibaba1688, Platform::JdEnterprise],
    )
    .unwrap()
    .with_specification("80g")
    .with_budget(Decimal::new(500, 0))
}

/// 1688 serves an offer landing at ¥410, JD at ¥450.
fn scripted_marketplaces(factory: &ScriptedFactory) {
    factory.register(
        Platform::Alibaba1688,
        SessionScript::new()
            .page(
                "https://s.1688.com/",
                search_page(
                    "https://s.1688.com/selloffer",
                    "offer-card",
                    &[(
                        "A4 paper 80g",
                        Decimal::new(40, 0),
                        "https://detail.1688.com/offer/1",
                    )],
                ),
            )
            .page(
                "https://detail.1688.com/",
                detail_page(
                    "https://detail.1688.com/offer/1",
                    "sku-item",
                    &["红色 ¥40.00", "蓝色 ¥40.00"],
                    Some(Decimal::new(10, 0)),
                ),
            ),
    );
    factory.register(
        Platform::JdEnterprise,
        SessionScript::new()
            .page(
                "https://search.jd.com/",
                search_page(
                    "https://search.jd.com/Search",
                    "gl-item",
                    &[(
                        "A4 paper 80g",
                        Decimal::new(45, 0),
                        "https://item.jd.com/100.html",
                    )],
                ),
            )
            .page(
                "https://item.jd.com/",
                detail_page(
                    "https://item.jd.com/100.html",
                    "sku-item",
                    &["500张 ¥45.00"],
                    None,
                ),
            ),
    );
}

fn orchestrator(factory: Arc<ScriptedFactory>, store: Arc<MemoryJobStore>) -> WorkflowOrchestrator {
    WorkflowOrchestrator::with_config(
        factory,
        store,
        OrchestratorConfig {
            platform_timeout: Duration::from_secs(5),
            ..OrchestratorConfig::default()
        },
    )
}

#[tokio::test]
async fn demand_parks_at_the_confirmation_gate_with_ranked_offers() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let orchestrator = orchestrator(factory.clone(), Arc::new(MemoryJobStore::new()));

    let report = orchestrator.run_workflow(demand()).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::PendingConfirmation);
    assert_eq!(report.recommendations.len(), 2);
    assert_eq!(report.recommendations[0].rank, 1);
    assert_eq!(report.recommendations[0].platform, Platform::Alibaba1688);
    assert_eq!(
        report.recommendations[0].landed_cost,
        Decimal::new(410, 0)
    );
    assert_eq!(report.recommendations[1].rank, 2);
    assert_eq!(
        report.recommendations[1].landed_cost,
        Decimal::new(450, 0)
    );
    assert!(!report.recommendations[0].reason.is_empty());

    // One session per platform, all released.
    assert_eq!(factory.opened_count(Platform::Alibaba1688), 1);
    assert_eq!(factory.opened_count(Platform::JdEnterprise), 1);
    assert!(factory.all_closed());
}

#[tokio::test]
async fn approval_places_exactly_one_order() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let orchestrator = orchestrator(factory.clone(), Arc::new(MemoryJobStore::new()));

    let parked = orchestrator.run_workflow(demand()).await.unwrap();
    let report = orchestrator.approve(&parked.workflow_id, 1).await.unwrap();

    assert_eq!(report.status, WorkflowStatus::Completed);
    let order = report.order.expect("completed workflow carries an order");
    assert_eq!(order.platform, Platform::Alibaba1688);
    assert_eq!(order.payment_amount, Decimal::new(410, 0));
    assert_eq!(order.workflow_id, parked.workflow_id);
    assert!(factory.all_closed());

    // The gate only opens once.
    let again = orchestrator.approve(&parked.workflow_id, 1).await;
    assert!(matches!(
        again,
        Err(ProcureError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn price_drift_at_order_time_fails_the_workflow() {
    let factory = Arc::new(ScriptedFactory::new());
    factory.register(
        Platform::Alibaba1688,
        SessionScript::new()
            .page(
                "https://s.1688.com/",
                search_page(
                    "https://s.1688.com/selloffer",
                    "offer-card",
                    &[(
                        "A4 paper 80g",
                        Decimal::new(40, 0),
                        "https://detail.1688.com/offer/1",
                    )],
                ),
            )
            .page(
                "https://detail.1688.com/",
                // The detail page quotes ¥55 against a ¥40 listing price.
                detail_page(
                    "https://detail.1688.com/offer/1",
                    "sku-item",
                    &["红色 ¥55.00"],
                    None,
                ),
            ),
    );
    let orchestrator = orchestrator(factory.clone(), Arc::new(MemoryJobStore::new()));
    let single = PurchaseDemand::new("A4 paper", 10, vec![Platform::Alibaba1688]).unwrap();

    let parked = orchestrator.run_workflow(single).await.unwrap();
    assert_eq!(parked.status, WorkflowStatus::PendingConfirmation);

    let report = orchestrator.approve(&parked.workflow_id, 1).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Failed);
    assert!(report.error.unwrap().contains("price changed"));
    assert!(report.order.is_none());
    assert!(factory.all_closed());
}

#[tokio::test]
async fn gone_stock_at_order_time_fails_the_workflow() {
    let factory = Arc::new(ScriptedFactory::new());
    factory.register(
        Platform::Alibaba1688,
        SessionScript::new()
            .page(
                "https://s.1688.com/",
                search_page(
                    "https://s.1688.com/selloffer",
                    "offer-card",
                    &[(
                        "A4 paper 80g",
                        Decimal::new(40, 0),
                        "https://detail.1688.com/offer/1",
                    )],
                ),
            )
            .page(
                "https://detail.1688.com/",
                detail_page(
                    "https://detail.1688.com/offer/1",
                    "sku-item",
                    &["红色 缺货", "蓝色 无货"],
                    None,
                ),
            ),
    );
    let orchestrator = orchestrator(factory, Arc::new(MemoryJobStore::new()));
    let single = PurchaseDemand::new("A4 paper", 10, vec![Platform::Alibaba1688]).unwrap();

    let parked = orchestrator.run_workflow(single).await.unwrap();
    let report = orchestrator.approve(&parked.workflow_id, 1).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Failed);
    assert!(report.error.unwrap().contains("out of stock"));
}

#[tokio::test]
async fn rejection_is_terminal() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let orchestrator = orchestrator(factory, Arc::new(MemoryJobStore::new()));

    let parked = orchestrator.run_workflow(demand()).await.unwrap();
    let report = orchestrator.reject(&parked.workflow_id).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Failed);
    assert!(report.error.unwrap().contains("rejected"));

    let again = orchestrator.reject(&parked.workflow_id).await;
    assert!(matches!(
        again,
        Err(ProcureError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn every_platform_failing_yields_no_candidates() {
    let factory = Arc::new(ScriptedFactory::new());
    factory.register(
        Platform::Alibaba1688,
        SessionScript::new().failing_navigation(),
    );
    factory.register(Platform::JdEnterprise, SessionScript::new().failing_navigation());
    let orchestrator = orchestrator(factory.clone(), Arc::new(MemoryJobStore::new()));

    let report = orchestrator.run_workflow(demand()).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Failed);
    assert!(report.error.unwrap().contains("no candidates"));
    assert!(factory.all_closed());
}

#[tokio::test]
async fn one_failing_platform_only_drops_its_candidates() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    // Overwrite JD with a dead marketplace; 1688 must still come through.
    factory.register(Platform::JdEnterprise, SessionScript::new().failing_navigation());
    let orchestrator = orchestrator(factory.clone(), Arc::new(MemoryJobStore::new()));

    let report = orchestrator.run_workflow(demand()).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::PendingConfirmation);
    assert_eq!(report.recommendations.len(), 1);
    assert_eq!(report.recommendations[0].platform, Platform::Alibaba1688);
    assert!(factory.all_closed());
}

#[tokio::test]
async fn stalled_platform_is_dropped_by_the_timeout() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    // Overwrite JD with a marketplace that hangs on every navigation; 1688
    // must reach the gate alone within the platform timeout.
    factory.register(
        Platform::JdEnterprise,
        SessionScript::new().slow_navigation(Duration::from_secs(30)),
    );
    let orchestrator = WorkflowOrchestrator::with_config(
        factory.clone(),
        Arc::new(MemoryJobStore::new()),
        OrchestratorConfig {
            platform_timeout: Duration::from_millis(300),
            ..OrchestratorConfig::default()
        },
    );

    let report = orchestrator.run_workflow(demand()).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::PendingConfirmation);
    assert_eq!(report.recommendations.len(), 1);
    assert_eq!(report.recommendations[0].platform, Platform::Alibaba1688);
    // The stalled session is still torn down after cancellation.
    assert_eq!(factory.opened_count(Platform::JdEnterprise), 1);
    assert!(factory.all_closed());
}

#[tokio::test]
async fn over_budget_offers_never_reach_the_gate() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let orchestrator = orchestrator(factory, Arc::new(MemoryJobStore::new()));

    let tight = PurchaseDemand::new(
        "A4 paper",
        10,
        vec![Platform::Alibaba1688, Platform::JdEnterprise],
    )
    .unwrap()
    .with_budget(Decimal::new(100, 0));
    let report = orchestrator.run_workflow(tight).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Failed);
    assert!(report.error.unwrap().contains("no candidates"));
}

#[tokio::test]
async fn parked_workflow_survives_a_restart() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let store = Arc::new(MemoryJobStore::new());

    let parked = {
        let first = orchestrator(factory.clone(), store.clone());
        first.run_workflow(demand()).await.unwrap()
    };

    // A fresh orchestrator over the same store picks the workflow up.
    let second = orchestrator(factory, store);
    let status = second.resume(&parked.workflow_id).await.unwrap();
    assert_eq!(status.status, WorkflowStatus::PendingConfirmation);

    let report = second.approve(&parked.workflow_id, 1).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Completed);
    assert!(report.order.is_some());
}

#[tokio::test]
async fn lapsed_approval_window_times_out() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let orchestrator = WorkflowOrchestrator::with_config(
        factory,
        Arc::new(MemoryJobStore::new()),
        OrchestratorConfig {
            confirmation_window: Duration::from_millis(20),
            ..OrchestratorConfig::default()
        },
    );

    let parked = orchestrator.run_workflow(demand()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let report = orchestrator.approve(&parked.workflow_id, 1).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Failed);
    assert!(report.error.unwrap().contains("confirmation window expired"));
}

#[tokio::test]
async fn expiry_sweep_collects_overdue_workflows() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let orchestrator = WorkflowOrchestrator::with_config(
        factory,
        Arc::new(MemoryJobStore::new()),
        OrchestratorConfig {
            confirmation_window: Duration::from_millis(20),
            ..OrchestratorConfig::default()
        },
    );

    let parked = orchestrator.run_workflow(demand()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let expired = orchestrator.expire_overdue().await.unwrap();
    assert_eq!(expired, vec![parked.workflow_id.clone()]);

    let status = orchestrator.resume(&parked.workflow_id).await.unwrap();
    assert_eq!(status.status, WorkflowStatus::Failed);

    // Nothing left to sweep.
    assert!(orchestrator.expire_overdue().await.unwrap().is_empty());
}

#[tokio::test]
async fn progress_events_track_the_pipeline() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let (observer, mut events) = ChannelObserver::new();
    let orchestrator = orchestrator(factory, Arc::new(MemoryJobStore::new()))
        .with_observer(Arc::new(observer));

    orchestrator.run_workflow(demand()).await.unwrap();

    let mut stages = Vec::new();
    while let Ok(event) = events.try_recv() {
        stages.push(event.stage);
    }
    assert!(stages.contains(&WorkflowStatus::Searching));
    assert!(stages.contains(&WorkflowStatus::Extracting));
    assert!(stages.contains(&WorkflowStatus::Scoring));
    assert!(stages.contains(&WorkflowStatus::PendingConfirmation));
}

/// Store wrapper capturing every checkpointed state, in order.
struct RecordingStore {
    inner: MemoryJobStore,
    checkpoints: StdMutex<Vec<WorkflowState>>,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: MemoryJobStore::new(),
            checkpoints: StdMutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn checkpoint(&self, state: &WorkflowState) -> Result<(), ProcureError> {
        self.checkpoints.lock().unwrap().push(state.clone());
        self.inner.checkpoint(state).await
    }

    async fn load(&self, workflow_id: &WorkflowId) -> Result<WorkflowState, ProcureError> {
        self.inner.load(workflow_id).await
    }

    async fn list(&self) -> Result<Vec<WorkflowId>, ProcureError> {
        self.inner.list().await
    }
}

#[tokio::test]
async fn every_ordering_checkpoint_carries_the_approved_selection() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let store = Arc::new(RecordingStore::new());
    let orchestrator = WorkflowOrchestrator::with_config(
        factory,
        store.clone(),
        OrchestratorConfig {
            platform_timeout: Duration::from_secs(5),
            ..OrchestratorConfig::default()
        },
    );

    let parked = orchestrator.run_workflow(demand()).await.unwrap();
    orchestrator.approve(&parked.workflow_id, 1).await.unwrap();

    // A crash after any checkpoint must never leave an ordering workflow
    // without its approved offer on disk.
    let checkpoints = store.checkpoints.lock().unwrap();
    let ordering: Vec<&WorkflowState> = checkpoints
        .iter()
        .filter(|s| s.status == WorkflowStatus::Ordering)
        .collect();
    assert!(!ordering.is_empty());
    for state in ordering {
        let selected = state.selected.as_ref().expect("selection persisted");
        assert_eq!(selected.rank, 1);
    }
}

#[tokio::test]
async fn gate_refusals_name_the_attempted_stage() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let orchestrator = orchestrator(factory, Arc::new(MemoryJobStore::new()));

    let parked = orchestrator.run_workflow(demand()).await.unwrap();
    orchestrator.approve(&parked.workflow_id, 1).await.unwrap();

    // Rejecting a finished workflow is refused as completed -> failed,
    // not completed -> ordering.
    let err = orchestrator.reject(&parked.workflow_id).await.unwrap_err();
    match err {
        ProcureError::InvalidTransition { from, to } => {
            assert_eq!(from, "completed");
            assert_eq!(to, "failed");
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = orchestrator.approve(&parked.workflow_id, 1).await.unwrap_err();
    match err {
        ProcureError::InvalidTransition { from, to } => {
            assert_eq!(from, "completed");
            assert_eq!(to, "ordering");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn unknown_rank_is_rejected_without_touching_the_workflow() {
    let factory = Arc::new(ScriptedFactory::new());
    scripted_marketplaces(&factory);
    let orchestrator = orchestrator(factory, Arc::new(MemoryJobStore::new()));

    let parked = orchestrator.run_workflow(demand()).await.unwrap();
    let err = orchestrator.approve(&parked.workflow_id, 9).await.unwrap_err();
    assert!(matches!(err, ProcureError::InvalidDemand { .. }));

    // Still parked; a valid approval goes through afterwards.
    let report = orchestrator.approve(&parked.workflow_id, 1).await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Completed);
}
