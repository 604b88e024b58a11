//! The workflow coordinator.
//!
//! One workflow fans out over the demand's preferred platforms, each
//! platform running in its own task with its own browser session. Platform
//! failures are local: they remove candidates, never the workflow, until
//! every candidate is gone. The confirmation gate is a true suspension:
//! `run_workflow` returns at `pending_confirmation` and `approve`/`reject`
//! pick the workflow back up, in this process or the next one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{info, warn};

use platform_adapter::{
    Alibaba1688Adapter, AdapterTuning, JdEnterpriseAdapter, NoopCredentialResolver,
    PlatformAdapter, SessionFactory, TmallSupermarketAdapter,
};
use extraction_engine::ExtractionEngine;
use procpilot_core_types::{
    Platform, ProcureError, PurchaseDemand, RawOffer, StepStatus, WorkflowId, WorkflowStatus,
};
use recommendation_scorer::RecommendationScorer;

use crate::executor::{AdapterRevalidator, OrderExecutor, RevalidatingExecutor};
use crate::observer::{emit, ProgressObserver, TracingObserver};
use crate::state::{WorkflowReport, WorkflowState};
use crate::store::JobStore;

/// Timing and sizing knobs for one orchestrator instance.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Hard cap on one platform's search-and-enrich task, session teardown
    /// included.
    pub platform_timeout: Duration,
    /// Approval window; a workflow parked longer than this fails with
    /// `ConfirmationTimeout` on its next touch or sweep.
    pub confirmation_window: Duration,
    /// At most this many recommendations reach the confirmation gate.
    pub max_recommendations: usize,
    /// Upward unit-price drift tolerated at order time, as a fraction.
    pub price_tolerance: f64,
    pub tuning: AdapterTuning,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            platform_timeout: Duration::from_secs(90),
            confirmation_window: Duration::from_secs(30 * 60),
            max_recommendations: 3,
            price_tolerance: 0.02,
            tuning: AdapterTuning::default(),
        }
    }
}

/// Build the standard adapter set, one per supported marketplace.
pub fn default_adapters(tuning: AdapterTuning) -> HashMap<Platform, Arc<dyn PlatformAdapter>> {
    let engine = Arc::new(ExtractionEngine::default());
    let credentials = Arc::new(NoopCredentialResolver);
    let mut adapters: HashMap<Platform, Arc<dyn PlatformAdapter>> = HashMap::new();
    adapters.insert(
        Platform::Alibaba1688,
        Arc::new(Alibaba1688Adapter::new(
            engine.clone(),
            credentials.clone(),
            tuning,
        )),
    );
    adapters.insert(
        Platform::JdEnterprise,
        Arc::new(JdEnterpriseAdapter::new(
            engine.clone(),
            credentials.clone(),
            tuning,
        )),
    );
    adapters.insert(
        Platform::TmallSupermarket,
        Arc::new(TmallSupermarketAdapter::new(engine, credentials, tuning)),
    );
    adapters
}

enum PlatformSignal {
    /// First offer parsed from this platform's search results.
    Discovered { platform: Platform },
    /// One offer, enriched with variants and freight.
    Enriched(Box<RawOffer>),
    /// The platform task finished, successfully or not.
    Done {
        platform: Platform,
        result: Result<usize, ProcureError>,
    },
}

pub struct WorkflowOrchestrator {
    factory: Arc<dyn SessionFactory>,
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
    scorer: RecommendationScorer,
    store: Arc<dyn JobStore>,
    observer: Arc<dyn ProgressObserver>,
    executor: Arc<dyn OrderExecutor>,
    config: OrchestratorConfig,
    /// Single writer per workflow across approve/reject/expiry races.
    locks: DashMap<WorkflowId, Arc<Mutex<()>>>,
}

impl WorkflowOrchestrator {
    pub fn new(factory: Arc<dyn SessionFactory>, store: Arc<dyn JobStore>) -> Self {
        Self::with_config(factory, store, OrchestratorConfig::default())
    }

    pub fn with_config(
        factory: Arc<dyn SessionFactory>,
        store: Arc<dyn JobStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let adapters = default_adapters(config.tuning);
        let executor = Arc::new(RevalidatingExecutor::new(
            Arc::new(AdapterRevalidator::new(factory.clone(), adapters.clone())),
            config.price_tolerance,
        ));
        Self {
            factory,
            adapters,
            scorer: RecommendationScorer::with_defaults(),
            store,
            observer: Arc::new(TracingObserver),
            executor,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn OrderExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_scorer(mut self, scorer: RecommendationScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Run a demand up to the confirmation gate. Returns `Ok` for every
    /// workflow-level outcome, including failure; `Err` is reserved for
    /// invalid input and storage trouble.
    pub async fn run_workflow(
        &self,
        demand: PurchaseDemand,
    ) -> Result<WorkflowReport, ProcureError> {
        let platforms: Vec<Platform> = demand
            .preferred_platforms
            .iter()
            .copied()
            .filter(|p| {
                let known = self.adapters.contains_key(p);
                if !known {
                    warn!(target: "workflow", platform = p.as_str(), "no adapter, skipping");
                }
                known
            })
            .collect();
        if platforms.is_empty() {
            return Err(ProcureError::InvalidDemand {
                reason: "no adapter available for any preferred platform".into(),
            });
        }

        let mut state = WorkflowState::new(demand.clone());
        self.store.checkpoint(&state).await?;
        info!(
            target: "workflow",
            workflow_id = %state.workflow_id,
            product = %demand.product_name,
            platforms = platforms.len(),
            "workflow started"
        );

        self.advance(&mut state, WorkflowStatus::Searching, None).await?;
        emit(
            self.observer.as_ref(),
            &state.workflow_id,
            WorkflowStatus::Searching,
            StepStatus::Running,
            format!("searching {} platforms", platforms.len()),
        )
        .await;

        let offers = self.fan_out(&mut state, &demand, &platforms).await?;

        if offers.is_empty() {
            return self.fail_and_report(&mut state, ProcureError::NoCandidatesFound).await;
        }

        self.advance(&mut state, WorkflowStatus::Scoring, None).await?;
        emit(
            self.observer.as_ref(),
            &state.workflow_id,
            WorkflowStatus::Scoring,
            StepStatus::Running,
            format!("scoring {} offers", offers.len()),
        )
        .await;

        let mut ranked = self.scorer.rank(&demand, &offers);
        ranked.truncate(self.config.max_recommendations);
        if ranked.is_empty() {
            return self.fail_and_report(&mut state, ProcureError::NoCandidatesFound).await;
        }
        // Truncation keeps the top of the ordering, so ranks stay 1..N.
        state.recommendations = ranked;

        state.confirmation_deadline =
            Some(Utc::now() + chrono::Duration::from_std(self.config.confirmation_window)
                .unwrap_or_else(|_| chrono::Duration::minutes(30)));
        self.advance(&mut state, WorkflowStatus::PendingConfirmation, None).await?;
        emit(
            self.observer.as_ref(),
            &state.workflow_id,
            WorkflowStatus::PendingConfirmation,
            StepStatus::Running,
            format!("{} recommendations awaiting approval", state.recommendations.len()),
        )
        .await;

        Ok(state.report())
    }

    /// One task per platform, each owning one session; results stream back
    /// over a single channel. Per-offer and per-platform failures drop
    /// candidates and nothing else.
    async fn fan_out(
        &self,
        state: &mut WorkflowState,
        demand: &PurchaseDemand,
        platforms: &[Platform],
    ) -> Result<Vec<RawOffer>, ProcureError> {
        let (tx, mut rx) = mpsc::channel::<PlatformSignal>(64);
        for platform in platforms {
            let adapter = self.adapters[platform].clone();
            let factory = self.factory.clone();
            let demand = demand.clone();
            let tx = tx.clone();
            let platform_timeout = self.config.platform_timeout;
            tokio::spawn(async move {
                let platform = adapter.platform();
                let result =
                    run_platform(factory, adapter, &demand, &tx, platform_timeout).await;
                let _ = tx.send(PlatformSignal::Done { platform, result }).await;
            });
        }
        drop(tx);

        let mut offers = Vec::new();
        let mut remaining = platforms.len();
        while let Some(signal) = rx.recv().await {
            match signal {
                PlatformSignal::Discovered { platform } => {
                    if state.status == WorkflowStatus::Searching {
                        self.advance(
                            state,
                            WorkflowStatus::Extracting,
                            Some(format!("first results from {platform}")),
                        )
                        .await?;
                        emit(
                            self.observer.as_ref(),
                            &state.workflow_id,
                            WorkflowStatus::Extracting,
                            StepStatus::Running,
                            format!("first results from {platform}"),
                        )
                        .await;
                    }
                }
                PlatformSignal::Enriched(offer) => offers.push(*offer),
                PlatformSignal::Done { platform, result } => {
                    remaining -= 1;
                    match result {
                        Ok(count) => {
                            emit(
                                self.observer.as_ref(),
                                &state.workflow_id,
                                state.status,
                                StepStatus::Completed,
                                format!("{platform}: {count} offers"),
                            )
                            .await;
                        }
                        Err(e) => {
                            warn!(
                                target: "workflow",
                                workflow_id = %state.workflow_id,
                                platform = platform.as_str(),
                                error = %e,
                                "platform task failed"
                            );
                            emit(
                                self.observer.as_ref(),
                                &state.workflow_id,
                                state.status,
                                StepStatus::Warning,
                                format!("{platform} dropped: {e}"),
                            )
                            .await;
                        }
                    }
                    if remaining == 0 {
                        break;
                    }
                }
            }
        }
        Ok(offers)
    }

    /// Approve the recommendation with the given rank and execute the
    /// order. Valid only while parked in `pending_confirmation` and inside
    /// the approval window; works against a restarted process because all
    /// state is loaded from the store.
    pub async fn approve(
        &self,
        workflow_id: &WorkflowId,
        rank: u32,
    ) -> Result<WorkflowReport, ProcureError> {
        let lock = self.lock_for(workflow_id);
        let _guard = lock.lock().await;

        let mut state = self.load_pending(workflow_id, WorkflowStatus::Ordering).await?;
        if let Some(report) = self.expire_if_overdue(&mut state).await? {
            return Ok(report);
        }

        let selected = state
            .recommendations
            .iter()
            .find(|r| r.rank == rank)
            .cloned()
            .ok_or_else(|| ProcureError::InvalidDemand {
                reason: format!("no recommendation ranked {rank}"),
            })?;

        // The selection is set before advancing so the `ordering`
        // checkpoint already carries it; a crash after that checkpoint
        // never leaves an ordering workflow without its approved offer.
        state.selected = Some(selected.clone());
        self.advance(
            &mut state,
            WorkflowStatus::Ordering,
            Some(format!("approved rank {rank}")),
        )
        .await?;
        emit(
            self.observer.as_ref(),
            &state.workflow_id,
            WorkflowStatus::Ordering,
            StepStatus::Running,
            format!("placing order on {}", selected.platform),
        )
        .await;

        match self
            .executor
            .execute(&state.workflow_id, &state.demand, &selected)
            .await
        {
            Ok(order) => {
                state.order = Some(order);
                self.advance(&mut state, WorkflowStatus::Completed, None).await?;
                emit(
                    self.observer.as_ref(),
                    &state.workflow_id,
                    WorkflowStatus::Completed,
                    StepStatus::Completed,
                    "order placed",
                )
                .await;
                Ok(state.report())
            }
            Err(e) => self.fail_and_report(&mut state, e).await,
        }
    }

    /// Reject the parked recommendations; the workflow fails terminally.
    pub async fn reject(&self, workflow_id: &WorkflowId) -> Result<WorkflowReport, ProcureError> {
        let lock = self.lock_for(workflow_id);
        let _guard = lock.lock().await;

        let mut state = self.load_pending(workflow_id, WorkflowStatus::Failed).await?;
        if let Some(report) = self.expire_if_overdue(&mut state).await? {
            return Ok(report);
        }
        self.fail_and_report(&mut state, ProcureError::Rejected).await
    }

    /// Reload a workflow from the store and report its current view,
    /// parked or finished. This is the re-entry point after a restart.
    pub async fn resume(&self, workflow_id: &WorkflowId) -> Result<WorkflowReport, ProcureError> {
        let mut state = self.store.load(workflow_id).await?;
        if state.status == WorkflowStatus::PendingConfirmation {
            let lock = self.lock_for(workflow_id);
            let _guard = lock.lock().await;
            state = self.store.load(workflow_id).await?;
            if let Some(report) = self.expire_if_overdue(&mut state).await? {
                return Ok(report);
            }
        }
        Ok(state.report())
    }

    /// Sweep every parked workflow whose approval window has lapsed.
    /// Returns the ids that expired.
    pub async fn expire_overdue(&self) -> Result<Vec<WorkflowId>, ProcureError> {
        let mut expired = Vec::new();
        for workflow_id in self.store.list().await? {
            let lock = self.lock_for(&workflow_id);
            let _guard = lock.lock().await;
            let Ok(mut state) = self.store.load(&workflow_id).await else {
                continue;
            };
            if state.status != WorkflowStatus::PendingConfirmation {
                continue;
            }
            if self.expire_if_overdue(&mut state).await?.is_some() {
                expired.push(workflow_id);
            }
        }
        Ok(expired)
    }

    /// Load a workflow that must still be parked at the gate. `intended`
    /// is the stage the caller wants to move to and names the refusal.
    async fn load_pending(
        &self,
        workflow_id: &WorkflowId,
        intended: WorkflowStatus,
    ) -> Result<WorkflowState, ProcureError> {
        let state = self.store.load(workflow_id).await?;
        if state.status != WorkflowStatus::PendingConfirmation {
            return Err(ProcureError::InvalidTransition {
                from: state.status.as_str().to_string(),
                to: intended.as_str().to_string(),
            });
        }
        Ok(state)
    }

    /// Lazy deadline check; the sweep and every gate entry point share it.
    async fn expire_if_overdue(
        &self,
        state: &mut WorkflowState,
    ) -> Result<Option<WorkflowReport>, ProcureError> {
        let overdue = state
            .confirmation_deadline
            .map(|deadline| Utc::now() > deadline)
            .unwrap_or(false);
        if !overdue {
            return Ok(None);
        }
        let report = self
            .fail_and_report(state, ProcureError::ConfirmationTimeout)
            .await?;
        Ok(Some(report))
    }

    async fn advance(
        &self,
        state: &mut WorkflowState,
        to: WorkflowStatus,
        note: Option<String>,
    ) -> Result<(), ProcureError> {
        state.transition(to, note)?;
        self.store.checkpoint(state).await
    }

    async fn fail_and_report(
        &self,
        state: &mut WorkflowState,
        error: ProcureError,
    ) -> Result<WorkflowReport, ProcureError> {
        state.fail(&error)?;
        self.store.checkpoint(state).await?;
        emit(
            self.observer.as_ref(),
            &state.workflow_id,
            WorkflowStatus::Failed,
            StepStatus::Failed,
            error.to_string(),
        )
        .await;
        Ok(state.report())
    }

    fn lock_for(&self, workflow_id: &WorkflowId) -> Arc<Mutex<()>> {
        self.locks
            .entry(workflow_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// One platform's whole contribution: open a session, search, enrich every
/// discovered offer against its detail page, and close the session on
/// every path, timeout included.
async fn run_platform(
    factory: Arc<dyn SessionFactory>,
    adapter: Arc<dyn PlatformAdapter>,
    demand: &PurchaseDemand,
    tx: &mpsc::Sender<PlatformSignal>,
    platform_timeout: Duration,
) -> Result<usize, ProcureError> {
    let platform = adapter.platform();
    let session = factory.open(platform).await?;

    let work = async {
        let (offer_tx, mut offer_rx) = mpsc::channel::<RawOffer>(32);
        let search = async {
            let result = adapter.search(session.as_ref(), demand, &offer_tx).await;
            drop(offer_tx);
            result
        };
        let drain = async {
            let mut discovered = Vec::new();
            while let Some(offer) = offer_rx.recv().await {
                if discovered.is_empty() {
                    let _ = tx.send(PlatformSignal::Discovered { platform }).await;
                }
                discovered.push(offer);
            }
            discovered
        };
        let (search_result, discovered) = tokio::join!(search, drain);
        search_result?;

        // Enrichment shares the search session; detail pages are visited
        // sequentially. A failed extraction drops that offer only.
        let mut enriched = 0usize;
        for mut offer in discovered {
            match adapter.extract_variants(session.as_ref(), &mut offer).await {
                Ok(_) => {
                    if tx.send(PlatformSignal::Enriched(Box::new(offer))).await.is_err() {
                        break;
                    }
                    enriched += 1;
                }
                Err(e) => warn!(
                    target: "workflow",
                    platform = platform.as_str(),
                    detail_url = %offer.detail_url,
                    error = %e,
                    "offer dropped after extraction failure"
                ),
            }
        }
        Ok(enriched)
    };

    let outcome = match timeout(platform_timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(ProcureError::PlatformUnavailable {
            platform,
            reason: format!("platform task exceeded {platform_timeout:?}"),
        }),
    };

    if let Err(e) = session.close().await {
        warn!(
            target: "workflow",
            platform = platform.as_str(),
            error = %e,
            "session close failed"
        );
    }
    outcome
}
