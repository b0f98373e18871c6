//! What the HTTP layer needs from the application, as one trait.
//!
//! Handlers stay generic over a single parameter instead of every port the
//! engine is built from.

use std::future::Future;
use std::sync::Arc;

use adpilot_app::ports::{
    ActionHistoryStore, AdAccountStore, AdPlatform, ExecutionLogStore, LabelStore, MetricsStore,
    PendingRevertStore, RuleRepository, SalesStore,
};
use adpilot_app::rule_engine::{CycleReport, RuleEngine, RunRequest};
use adpilot_app::services::rule_service::RuleService;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution_log::ExecutionLog;
use adpilot_domain::id::RuleId;

pub trait RuleBackend: Send + Sync + 'static {
    fn run_rule(
        &self,
        request: RunRequest,
    ) -> impl Future<Output = Result<CycleReport, AdPilotError>> + Send;

    fn rule_logs(
        &self,
        rule_id: RuleId,
        limit: Option<u32>,
    ) -> impl Future<Output = Result<Vec<ExecutionLog>, AdPilotError>> + Send;
}

/// [`RuleBackend`] over the real engine and rule service.
pub struct EngineBackend<R, A, L, M, S, E, H, P, V> {
    engine: Arc<RuleEngine<R, A, L, M, S, E, H, P, V>>,
    rules: Arc<RuleService<R, E>>,
}

impl<R, A, L, M, S, E, H, P, V> EngineBackend<R, A, L, M, S, E, H, P, V> {
    /// The engine is shared so the scheduler task can drive the same instance.
    pub fn new(
        engine: Arc<RuleEngine<R, A, L, M, S, E, H, P, V>>,
        rules: Arc<RuleService<R, E>>,
    ) -> Self {
        Self { engine, rules }
    }
}

impl<R, A, L, M, S, E, H, P, V> RuleBackend for EngineBackend<R, A, L, M, S, E, H, P, V>
where
    R: RuleRepository + Send + Sync + 'static,
    A: AdAccountStore + Send + Sync + 'static,
    L: LabelStore + Send + Sync + 'static,
    M: MetricsStore + Send + Sync + 'static,
    S: SalesStore + Send + Sync + 'static,
    E: ExecutionLogStore + Send + Sync + 'static,
    H: ActionHistoryStore + Send + Sync + 'static,
    P: AdPlatform + Send + Sync + 'static,
    V: PendingRevertStore + Send + Sync + 'static,
{
    async fn run_rule(&self, request: RunRequest) -> Result<CycleReport, AdPilotError> {
        self.engine.run(request).await
    }

    async fn rule_logs(
        &self,
        rule_id: RuleId,
        limit: Option<u32>,
    ) -> Result<Vec<ExecutionLog>, AdPilotError> {
        self.rules.recent_logs(rule_id, limit).await
    }
}
