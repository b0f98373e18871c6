//! Rule engine: runs one rule-evaluation cycle end to end.
//!
//! A cycle loads the rule, writes a `pending` log entry, takes the rule's
//! processing lock, aggregates performance for every target object, enriches
//! it with sales data, resolves the rule per object and applies the resulting
//! actions one at a time. The lock is released and the log entry finished on
//! every path, including failures.

use std::collections::{HashMap, HashSet};

use adpilot_domain::budget::roas_guard;
use adpilot_domain::currency::CurrencyPolicy;
use adpilot_domain::error::{AdPilotError, ConfigurationError, NotFoundError};
use adpilot_domain::execution_log::{
    ActionExecution, ActionReport, ActionResult, EntityOutcome, EntityReport, ExecutionLog,
    LogCompletion, LogStatus,
};
use adpilot_domain::id::{ExecutionLogId, RuleId, UserId};
use adpilot_domain::metrics::{AggregatedEntity, RawPerformanceRecord, aggregate};
use adpilot_domain::rule::{DateWindow, PlannedAction, Resolution, Rule, Scope, resolve};
use adpilot_domain::time::{self, Timestamp, local_date};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::ports::{
    ActionHistoryStore, AdAccountStore, AdPlatform, ExecutionLogStore, LabelStore, MetricsQuery,
    MetricsStore, ObjectFilter, PendingRevertStore, RuleRepository, SalesStore,
};
use crate::services::action_executor::{ActionExecutor, ExecutionTarget, ExecutorSettings};
use crate::services::cooldown_guard::CooldownGuard;
use crate::services::cycle_context::CycleContext;
use crate::services::revert_scheduler::RevertScheduler;
use crate::services::sales_enricher::SalesEnricher;

const LOCKED_MESSAGE: &str = "rule is already being processed";
const INACTIVE_MESSAGE: &str = "rule is inactive";

/// Engine-wide knobs.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Reporting timezone: date windows and daily resets follow it.
    pub timezone: Tz,
    /// A processing lock older than this is considered abandoned.
    pub lock_ttl: chrono::Duration,
    pub executor: ExecutorSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Ho_Chi_Minh,
            lock_ttl: chrono::Duration::minutes(5),
            executor: ExecutorSettings::default(),
        }
    }
}

/// Every driven port the engine talks to.
pub struct EnginePorts<R, A, L, M, S, E, H, P, V> {
    pub rules: R,
    pub accounts: A,
    pub labels: L,
    pub metrics: M,
    pub sales: S,
    pub logs: E,
    pub history: H,
    pub platform: P,
    pub reverts: V,
}

/// Input of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub rule_id: RuleId,
    pub user_id: UserId,
    #[serde(default)]
    pub manual_run: bool,
    #[serde(default)]
    pub dry_run: bool,
}

/// What a cycle did, as returned to the invoker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub log_id: ExecutionLogId,
    pub rule_id: RuleId,
    pub status: LogStatus,
    pub matched_count: u32,
    pub executed_count: u32,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub entities: Vec<EntityReport>,
}

impl CycleReport {
    fn new(log_id: ExecutionLogId, rule_id: RuleId, dry_run: bool, completion: LogCompletion) -> Self {
        Self {
            log_id,
            rule_id,
            status: completion.status,
            matched_count: completion.matched_count,
            executed_count: completion.executed_count,
            dry_run,
            message: completion.message,
            entities: completion.details,
        }
    }
}

/// Counts from one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub succeeded: u32,
    pub skipped: u32,
    pub failed: u32,
}

pub struct RuleEngine<R, A, L, M, S, E, H, P, V> {
    rules: R,
    accounts: A,
    labels: L,
    metrics: M,
    logs: E,
    enricher: SalesEnricher<S>,
    guard: CooldownGuard<H>,
    executor: ActionExecutor<P, V>,
    policy: CurrencyPolicy,
    timezone: Tz,
    lock_ttl: chrono::Duration,
}

impl<R, A, L, M, S, E, H, P, V> RuleEngine<R, A, L, M, S, E, H, P, V>
where
    R: RuleRepository,
    A: AdAccountStore,
    L: LabelStore,
    M: MetricsStore,
    S: SalesStore,
    E: ExecutionLogStore,
    H: ActionHistoryStore,
    P: AdPlatform,
    V: PendingRevertStore,
{
    pub fn new(ports: EnginePorts<R, A, L, M, S, E, H, P, V>, settings: EngineSettings) -> Self {
        let policy = settings.executor.policy.clone();
        Self {
            rules: ports.rules,
            accounts: ports.accounts,
            labels: ports.labels,
            metrics: ports.metrics,
            logs: ports.logs,
            enricher: SalesEnricher::new(ports.sales),
            guard: CooldownGuard::new(ports.history),
            executor: ActionExecutor::new(
                ports.platform,
                RevertScheduler::new(ports.reverts),
                settings.executor,
            ),
            policy,
            timezone: settings.timezone,
            lock_ttl: settings.lock_ttl,
        }
    }

    /// Run one cycle now.
    ///
    /// # Errors
    ///
    /// See [`RuleEngine::run_at`].
    pub async fn run(&self, request: RunRequest) -> Result<CycleReport, AdPilotError> {
        self.run_at(request, time::now()).await
    }

    /// Run one cycle as if the clock read `now`.
    ///
    /// Skipped cycles (inactive rule on a scheduled run, lock held elsewhere)
    /// are reported as `Ok` with status `skipped`.
    ///
    /// # Errors
    ///
    /// - [`AdPilotError::NotFound`] when the rule does not exist or belongs to
    ///   another user; no log entry is written.
    /// - [`AdPilotError::Configuration`] when the stored rule cannot be
    ///   decoded; a `failed` log entry is written for it.
    /// - Any error that aborted the cycle, after the log entry was finished
    ///   as `failed` and the lock released.
    #[tracing::instrument(
        skip(self, request),
        fields(rule_id = %request.rule_id, dry_run = request.dry_run, manual_run = request.manual_run)
    )]
    pub async fn run_at(
        &self,
        request: RunRequest,
        now: Timestamp,
    ) -> Result<CycleReport, AdPilotError> {
        let rule = match self.rules.get_by_id(request.rule_id).await {
            Ok(found) => found
                .filter(|rule| rule.user_id == request.user_id)
                .ok_or_else(|| rule_not_found(request.rule_id))?,
            Err(AdPilotError::Configuration(err @ ConfigurationError::MalformedRuleField { .. })) => {
                return Err(self.reject_unreadable(request, err, now).await);
            }
            Err(err) => return Err(err),
        };

        let log = self
            .logs
            .create(ExecutionLog::pending(rule.id, request.dry_run, now))
            .await?;

        if !rule.active && !request.manual_run {
            tracing::info!("{INACTIVE_MESSAGE}, skipping scheduled run");
            let completion = LogCompletion::bare(LogStatus::Skipped, INACTIVE_MESSAGE, time::now());
            self.conclude(&rule, log.id, &completion, now).await;
            return Ok(CycleReport::new(log.id, rule.id, request.dry_run, completion));
        }

        match self
            .rules
            .try_acquire_lock(rule.id, now, now - self.lock_ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("{LOCKED_MESSAGE}");
                let completion =
                    LogCompletion::bare(LogStatus::Skipped, LOCKED_MESSAGE, time::now());
                // The running cycle owns last-run; only the log entry is closed.
                self.write_completion(log.id, &completion).await;
                return Ok(CycleReport::new(log.id, rule.id, request.dry_run, completion));
            }
            Err(err) => {
                tracing::error!(error = %err.detailed_message(), "failed to acquire processing lock");
                let completion =
                    LogCompletion::bare(LogStatus::Failed, err.detailed_message(), time::now());
                self.conclude(&rule, log.id, &completion, now).await;
                return Err(err);
            }
        }

        let outcome = self.evaluate(&rule, request.dry_run, now).await;

        if let Err(err) = self.rules.release_lock(rule.id).await {
            tracing::warn!(error = %err.detailed_message(), "failed to release processing lock");
        }

        match outcome {
            Ok(details) => {
                let completion = LogCompletion::from_reports(details, time::now());
                tracing::info!(
                    matched = completion.matched_count,
                    executed = completion.executed_count,
                    "cycle finished"
                );
                self.conclude(&rule, log.id, &completion, now).await;
                Ok(CycleReport::new(log.id, rule.id, request.dry_run, completion))
            }
            Err(err) => {
                tracing::error!(error = %err.detailed_message(), "cycle failed");
                let completion =
                    LogCompletion::bare(LogStatus::Failed, err.detailed_message(), time::now());
                self.conclude(&rule, log.id, &completion, now).await;
                Err(err)
            }
        }
    }

    /// Run a cycle for every active, auto-scheduled rule.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the schedulable rules cannot be listed.
    /// Failures of individual cycles are counted, not returned.
    #[tracing::instrument(skip(self))]
    pub async fn run_scheduled(&self, now: Timestamp) -> Result<ScheduleReport, AdPilotError> {
        let rules = self.rules.get_schedulable().await?;
        let mut report = ScheduleReport::default();
        for rule in rules {
            let request = RunRequest {
                rule_id: rule.id,
                user_id: rule.user_id,
                manual_run: false,
                dry_run: false,
            };
            match self.run_at(request, now).await {
                Ok(cycle) if cycle.status == LogStatus::Skipped => report.skipped += 1,
                Ok(_) => report.succeeded += 1,
                Err(_) => report.failed += 1,
            }
        }
        Ok(report)
    }

    async fn evaluate(
        &self,
        rule: &Rule,
        dry_run: bool,
        now: Timestamp,
    ) -> Result<Vec<EntityReport>, AdPilotError> {
        let accounts = self.accounts.active_for_user(rule.user_id).await?;
        if accounts.is_empty() {
            return Err(ConfigurationError::NoActiveAdAccount {
                user_id: rule.user_id.to_string(),
            }
            .into());
        }
        let context = CycleContext::new(accounts, self.timezone);
        let window = rule.time_range.window(local_date(now, self.timezone));

        let mut entities = self.collect_entities(rule, &context, window).await?;
        tracing::debug!(count = entities.len(), since = %window.since, until = %window.until, "objects aggregated");
        self.enricher.enrich(&mut entities, rule.scope, window).await;

        let mut reports = Vec::with_capacity(entities.len());
        for entity in &entities {
            reports.push(self.process_entity(rule, entity, &context, dry_run, now).await);
        }
        Ok(reports)
    }

    /// Aggregated objects the rule applies to, across every active account.
    async fn collect_entities(
        &self,
        rule: &Rule,
        context: &CycleContext,
        window: DateWindow,
    ) -> Result<Vec<AggregatedEntity>, AdPilotError> {
        if rule.target_labels.is_empty() {
            let records = self
                .fetch_all_accounts(rule, context, rule.scope, window, None)
                .await;
            return Ok(aggregate(&records, rule.scope, context.currencies(), &self.policy));
        }

        let assignments = self
            .labels
            .assignments(rule.user_id, &rule.target_labels)
            .await?;
        if assignments.is_empty() {
            tracing::info!("no object carries the rule's labels");
            return Ok(Vec::new());
        }

        let mut by_level: HashMap<Scope, Vec<String>> = HashMap::new();
        for assignment in assignments {
            let ids = by_level.entry(assignment.level).or_default();
            if !ids.contains(&assignment.object_id) {
                ids.push(assignment.object_id);
            }
        }

        let mut seen = HashSet::new();
        let mut entities = Vec::new();
        for level in Scope::ALL {
            let Some(ids) = by_level.remove(&level) else {
                continue;
            };
            // Finer labels are read at their own level and rolled up to the rule scope.
            let query_level = if level.is_finer_than(rule.scope) {
                level
            } else {
                rule.scope
            };
            let filter = ObjectFilter { level, ids };
            let records = self
                .fetch_all_accounts(rule, context, query_level, window, Some(filter))
                .await;
            for entity in aggregate(&records, rule.scope, context.currencies(), &self.policy) {
                if seen.insert(entity.object_id.clone()) {
                    entities.push(entity);
                }
            }
        }
        Ok(entities)
    }

    async fn fetch_all_accounts(
        &self,
        rule: &Rule,
        context: &CycleContext,
        level: Scope,
        window: DateWindow,
        filter: Option<ObjectFilter>,
    ) -> Vec<RawPerformanceRecord> {
        let mut records = Vec::new();
        for account in context.accounts() {
            let query = MetricsQuery {
                user_id: rule.user_id,
                ad_account_id: account.id.clone(),
                level,
                window,
                filter: filter.clone(),
            };
            match self.metrics.fetch(&query).await {
                Ok(batch) => records.extend(batch),
                Err(err) => tracing::warn!(
                    ad_account_id = %account.id,
                    error = %err.detailed_message(),
                    "metrics fetch failed, treating account as empty"
                ),
            }
        }
        records
    }

    async fn process_entity(
        &self,
        rule: &Rule,
        entity: &AggregatedEntity,
        context: &CycleContext,
        dry_run: bool,
        now: Timestamp,
    ) -> EntityReport {
        let planned = match resolve(rule, entity) {
            Resolution::Blocked { step_id, order } => {
                tracing::debug!(object_id = %entity.object_id, order, "override step matched");
                return EntityReport::new(entity, EntityOutcome::Blocked { step_id, order });
            }
            Resolution::Actions(planned) if planned.is_empty() => {
                return EntityReport::new(entity, EntityOutcome::NoMatch);
            }
            Resolution::Actions(planned) => planned,
        };

        let mut actions = Vec::with_capacity(planned.len());
        for item in &planned {
            actions.push(self.apply(rule, entity, item, context, dry_run, now).await);
        }
        EntityReport::new(entity, EntityOutcome::Matched { actions })
    }

    async fn apply(
        &self,
        rule: &Rule,
        entity: &AggregatedEntity,
        planned: &PlannedAction,
        context: &CycleContext,
        dry_run: bool,
        now: Timestamp,
    ) -> ActionReport {
        let kind = planned.action.kind();
        let report = |result| ActionReport::new(kind, planned.source, result);

        if let Some(reason) = roas_guard(
            &planned.action,
            entity.sales.roas,
            rule.settings.min_roas_for_increase,
        ) {
            tracing::info!(object_id = %entity.object_id, %reason, "budget increase refused");
            return report(ActionResult::Skipped).with_reason(reason);
        }

        let credential = match context.credential_of(&entity.ad_account_id) {
            Ok(credential) => credential,
            Err(err) => {
                let message = AdPilotError::from(err).detailed_message();
                tracing::warn!(object_id = %entity.object_id, error = %message, "cannot reach account");
                return report(ActionResult::Failed).with_reason(message);
            }
        };

        match self
            .guard
            .can_execute(rule.id, &entity.object_id, kind, &rule.settings, self.timezone, now)
            .await
        {
            Ok(decision) if !decision.allowed => {
                let reason = decision.reason.unwrap_or_default();
                tracing::info!(object_id = %entity.object_id, action = %kind, %reason, "action held back");
                return report(ActionResult::Skipped).with_reason(reason);
            }
            Ok(_) => {}
            Err(err) => {
                let message = err.detailed_message();
                tracing::warn!(object_id = %entity.object_id, error = %message, "execution history unavailable");
                return report(ActionResult::Failed).with_reason(message);
            }
        }

        let target = ExecutionTarget {
            rule_id: rule.id,
            user_id: rule.user_id,
            object_id: &entity.object_id,
            ad_account_id: &entity.ad_account_id,
            credential,
            currency: context.currency_of(&entity.ad_account_id),
            timezone: context.timezone_of(&entity.ad_account_id),
            settings: &rule.settings,
        };

        match self.executor.execute(&planned.action, &target, dry_run, now).await {
            Ok(outcome) => {
                if outcome.result == ActionResult::Executed && !dry_run {
                    let execution = ActionExecution {
                        rule_id: rule.id,
                        object_id: entity.object_id.clone(),
                        action: kind,
                        executed_at: now,
                    };
                    if let Err(err) = self.guard.record(execution).await {
                        tracing::warn!(error = %err.detailed_message(), "failed to record execution");
                    }
                }
                let mut action_report = report(outcome.result);
                action_report.reason = outcome.reason;
                action_report.payload = outcome.payload;
                action_report
            }
            Err(err) => {
                let message = err.detailed_message();
                tracing::warn!(object_id = %entity.object_id, action = %kind, error = %message, "action failed");
                let failed = report(ActionResult::Failed).with_reason(message);
                match &err {
                    AdPilotError::ExternalApi(api) => failed.with_payload(api.payload()),
                    _ => failed,
                }
            }
        }
    }

    /// Record a failed cycle for a stored rule whose definition cannot be
    /// decoded, then hand the error back to the caller.
    async fn reject_unreadable(
        &self,
        request: RunRequest,
        err: ConfigurationError,
        now: Timestamp,
    ) -> AdPilotError {
        match self.rules.owner_of(request.rule_id).await {
            Ok(Some(owner)) if owner == request.user_id => {}
            Ok(_) => return rule_not_found(request.rule_id).into(),
            Err(lookup) => return lookup,
        }

        let err = AdPilotError::from(err);
        let message = err.detailed_message();
        tracing::error!(error = %message, "stored rule is unreadable");
        let completion = LogCompletion::bare(LogStatus::Failed, message, time::now());
        match self
            .logs
            .create(ExecutionLog::pending(request.rule_id, request.dry_run, now))
            .await
        {
            Ok(log) => self.write_completion(log.id, &completion).await,
            Err(log_err) => {
                tracing::warn!(error = %log_err.detailed_message(), "failed to open log entry");
            }
        }
        if let Err(stamp) = self
            .rules
            .update_last_run(request.rule_id, LogStatus::Failed, now)
            .await
        {
            tracing::warn!(error = %stamp.detailed_message(), "failed to stamp last run");
        }
        err
    }

    /// Finish the log entry and stamp the rule's last run.
    async fn conclude(&self, rule: &Rule, log_id: ExecutionLogId, completion: &LogCompletion, at: Timestamp) {
        self.write_completion(log_id, completion).await;
        if let Err(err) = self.rules.update_last_run(rule.id, completion.status, at).await {
            tracing::warn!(error = %err.detailed_message(), "failed to stamp last run");
        }
    }

    /// Full write first; on failure, status and message only.
    async fn write_completion(&self, log_id: ExecutionLogId, completion: &LogCompletion) {
        let Err(err) = self.logs.finish(log_id, completion).await else {
            return;
        };
        tracing::warn!(%log_id, error = %err.detailed_message(), "full log write failed, retrying without detail");
        if let Err(err) = self
            .logs
            .finish_minimal(
                log_id,
                completion.status,
                completion.message.as_deref(),
                completion.finished_at,
            )
            .await
        {
            tracing::error!(%log_id, error = %err.detailed_message(), "log entry left pending");
        }
    }
}

fn rule_not_found(id: RuleId) -> NotFoundError {
    NotFoundError {
        entity: "Rule",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use adpilot_domain::account::{RemoteStatus, TargetStatus};
    use adpilot_domain::id::LabelId;
    use adpilot_domain::label::LabelAssignment;
    use adpilot_domain::rule::{
        Action, ActionKind, ActionSource, AdvancedSettings, BudgetAdjustment, Condition, Operator,
        Step, StepLogic,
    };
    use chrono::{DateTime, Duration, NaiveDate};

    use super::*;
    use crate::testing::{
        InMemoryAccounts, InMemoryHistory, InMemoryLabels, InMemoryLogs, InMemoryMetrics,
        InMemoryReverts, InMemoryRuleRepo, InMemorySales, PlatformCall, SpyPlatform, account,
        ad_group_record, campaign_record,
    };

    type TestEngine = RuleEngine<
        InMemoryRuleRepo,
        InMemoryAccounts,
        InMemoryLabels,
        InMemoryMetrics,
        InMemorySales,
        InMemoryLogs,
        InMemoryHistory,
        SpyPlatform,
        InMemoryReverts,
    >;

    /// 12:00 local time in Ho Chi Minh City.
    fn now() -> Timestamp {
        DateTime::parse_from_rfc3339("2024-05-10T05:00:00Z")
            .unwrap()
            .to_utc()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn pause() -> Action {
        Action::TurnOff { auto_revert: None }
    }

    fn spend_above(value: f64) -> Condition {
        Condition::new("spend", Operator::GreaterThan, value)
    }

    struct Harness {
        rules: InMemoryRuleRepo,
        logs: InMemoryLogs,
        history: InMemoryHistory,
        platform: SpyPlatform,
        metrics: InMemoryMetrics,
        engine: TestEngine,
    }

    struct Setup {
        rules: Vec<Rule>,
        accounts: Vec<adpilot_domain::account::AdAccount>,
        labels: InMemoryLabels,
        metrics: InMemoryMetrics,
        logs: InMemoryLogs,
        platform: SpyPlatform,
    }

    impl Setup {
        fn new(user: UserId, rules: Vec<Rule>, records: Vec<RawPerformanceRecord>) -> Self {
            Self {
                rules,
                accounts: vec![account(user, "act_1", "VND")],
                labels: InMemoryLabels::default(),
                metrics: InMemoryMetrics::with(records),
                logs: InMemoryLogs::default(),
                platform: SpyPlatform::default(),
            }
        }

        fn build(self) -> Harness {
            let rules = InMemoryRuleRepo::with(self.rules);
            let history = InMemoryHistory::default();
            let engine = RuleEngine::new(
                EnginePorts {
                    rules: rules.clone(),
                    accounts: InMemoryAccounts::with(self.accounts),
                    labels: self.labels,
                    metrics: self.metrics.clone(),
                    sales: InMemorySales::default(),
                    logs: self.logs.clone(),
                    history: history.clone(),
                    platform: self.platform.clone(),
                    reverts: InMemoryReverts::default(),
                },
                EngineSettings::default(),
            );
            Harness {
                rules,
                logs: self.logs,
                history,
                platform: self.platform,
                metrics: self.metrics,
                engine,
            }
        }
    }

    fn request(rule: &Rule) -> RunRequest {
        RunRequest {
            rule_id: rule.id,
            user_id: rule.user_id,
            manual_run: false,
            dry_run: false,
        }
    }

    fn pause_rule(user: UserId) -> Rule {
        Rule::builder()
            .user_id(user)
            .name("Pause expensive campaigns")
            .condition(spend_above(100_000.0))
            .action(pause())
            .build()
            .unwrap()
    }

    fn actions_of(report: &EntityReport) -> &[ActionReport] {
        match &report.outcome {
            EntityOutcome::Matched { actions } => actions,
            other => panic!("expected matched outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_pause_matching_campaign_and_write_success_log() {
        let user = UserId::new();
        let rule = pause_rule(user);
        let h = Setup::new(
            user,
            vec![rule.clone()],
            vec![
                campaign_record("act_1", "c1", today(), 150_000.0, 3.0),
                campaign_record("act_1", "c2", today(), 50_000.0, 3.0),
            ],
        )
        .build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        assert_eq!(report.status, LogStatus::Success);
        assert_eq!(report.matched_count, 1);
        assert_eq!(report.executed_count, 1);
        assert_eq!(
            h.platform.mutating_calls(),
            vec![PlatformCall::SetStatus("c1".to_string(), TargetStatus::Paused)]
        );
        let log = h.logs.only();
        assert_eq!(log.status, LogStatus::Success);
        assert_eq!(log.details.len(), 2);
        assert_eq!(h.history.len(), 1);
        let stored = h.rules.get(rule.id);
        assert_eq!(stored.last_run_status, Some(LogStatus::Success));
        assert_eq!(stored.processing_since, None);
    }

    #[tokio::test]
    async fn should_block_every_action_when_keep_step_matches() {
        let user = UserId::new();
        let rule = Rule::builder()
            .user_id(user)
            .name("Pause unless converting")
            .condition(spend_above(100_000.0))
            .action(pause())
            .step(
                Step::new(1, StepLogic::Or, Action::Keep)
                    .with_condition(Condition::new("results", Operator::GreaterOrEqual, 5.0)),
            )
            .step(Step::new(2, StepLogic::Or, Action::TurnOn).with_condition(spend_above(0.0)))
            .build()
            .unwrap();
        let h = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 8.0)],
        )
        .build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        assert!(h.platform.calls().is_empty());
        assert_eq!(report.matched_count, 0);
        assert!(matches!(
            report.entities[0].outcome,
            EntityOutcome::Blocked { order: 1, .. }
        ));
    }

    #[tokio::test]
    async fn should_run_or_step_but_not_and_step_when_root_does_not_match() {
        let user = UserId::new();
        let rule = Rule::builder()
            .user_id(user)
            .name("Stepped")
            .condition(spend_above(1_000_000.0))
            .action(pause())
            .step(
                Step::new(1, StepLogic::And, Action::DecreaseBudget(BudgetAdjustment::percentage(10.0)))
                    .with_condition(spend_above(0.0)),
            )
            .step(Step::new(2, StepLogic::Or, Action::TurnOn).with_condition(spend_above(0.0)))
            .build()
            .unwrap();
        let h = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        )
        .build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        let actions = actions_of(&report.entities[0]);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, ActionKind::TurnOn);
        assert!(matches!(actions[0].source, ActionSource::Step { order: 2, .. }));
    }

    #[tokio::test]
    async fn should_report_would_execute_without_mutating_when_dry_run() {
        let user = UserId::new();
        let rule = pause_rule(user);
        let h = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        )
        .build();

        let report = h
            .engine
            .run_at(
                RunRequest {
                    dry_run: true,
                    ..request(&rule)
                },
                now(),
            )
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.executed_count, 1);
        assert_eq!(
            actions_of(&report.entities[0])[0].result,
            ActionResult::WouldExecute
        );
        assert!(h.platform.mutating_calls().is_empty());
        assert_eq!(h.history.len(), 0);
        assert!(h.logs.only().dry_run);
    }

    #[tokio::test]
    async fn should_skip_cycle_when_rule_is_locked() {
        let user = UserId::new();
        let mut rule = pause_rule(user);
        rule.processing_since = Some(now() - Duration::minutes(1));
        let h = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        )
        .build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        assert_eq!(report.status, LogStatus::Skipped);
        assert_eq!(report.message.as_deref(), Some("rule is already being processed"));
        assert!(h.platform.calls().is_empty());
        assert!(h.metrics.queries.lock().unwrap().is_empty());
        assert_eq!(h.rules.get(rule.id).processing_since, rule.processing_since);
    }

    #[tokio::test]
    async fn should_reclaim_lock_when_it_is_stale() {
        let user = UserId::new();
        let mut rule = pause_rule(user);
        rule.processing_since = Some(now() - Duration::minutes(30));
        let h = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        )
        .build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        assert_eq!(report.status, LogStatus::Success);
        assert_eq!(h.rules.get(rule.id).processing_since, None);
    }

    #[tokio::test]
    async fn should_skip_inactive_rule_when_run_is_scheduled() {
        let user = UserId::new();
        let mut rule = pause_rule(user);
        rule.active = false;
        let h = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        )
        .build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        assert_eq!(report.status, LogStatus::Skipped);
        assert_eq!(report.message.as_deref(), Some("rule is inactive"));
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn should_evaluate_inactive_rule_when_run_is_manual() {
        let user = UserId::new();
        let mut rule = pause_rule(user);
        rule.active = false;
        let h = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        )
        .build();

        let report = h
            .engine
            .run_at(
                RunRequest {
                    manual_run: true,
                    ..request(&rule)
                },
                now(),
            )
            .await
            .unwrap();

        assert_eq!(report.status, LogStatus::Success);
        assert_eq!(report.executed_count, 1);
    }

    #[tokio::test]
    async fn should_write_minimal_log_when_full_write_fails() {
        let user = UserId::new();
        let rule = pause_rule(user);
        let mut setup = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        );
        setup.logs = InMemoryLogs {
            fail_full_finish: true,
            ..InMemoryLogs::default()
        };
        let h = setup.build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        assert_eq!(report.status, LogStatus::Success);
        let log = h.logs.only();
        assert_eq!(log.status, LogStatus::Success);
        assert!(log.finished_at.is_some());
        assert!(log.details.is_empty());
    }

    #[tokio::test]
    async fn should_continue_with_next_object_when_platform_rejects_one() {
        let user = UserId::new();
        let rule = pause_rule(user);
        let mut setup = Setup::new(
            user,
            vec![rule.clone()],
            vec![
                campaign_record("act_1", "c1", today(), 150_000.0, 3.0),
                campaign_record("act_1", "c2", today(), 150_000.0, 3.0),
            ],
        );
        setup.platform = SpyPlatform::default().rejecting("c1");
        let h = setup.build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        assert_eq!(report.status, LogStatus::Success);
        let failed = &actions_of(&report.entities[0])[0];
        assert_eq!(failed.result, ActionResult::Failed);
        assert_eq!(failed.payload.as_ref().unwrap()["error"]["code"], 100);
        assert_eq!(actions_of(&report.entities[1])[0].result, ActionResult::Executed);
        assert_eq!(report.executed_count, 1);
        assert_eq!(h.history.len(), 1);
    }

    #[tokio::test]
    async fn should_hold_back_second_execution_when_limit_is_reached() {
        let user = UserId::new();
        let rule = Rule::builder()
            .user_id(user)
            .name("Pause once a day")
            .condition(spend_above(100_000.0))
            .action(pause())
            .settings(AdvancedSettings {
                enable_execution_limit: true,
                ..AdvancedSettings::default()
            })
            .build()
            .unwrap();
        let h = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        )
        .build();
        h.engine.run_at(request(&rule), now()).await.unwrap();
        // Someone turned it back on by hand.
        h.platform
            .statuses
            .lock()
            .unwrap()
            .insert("c1".to_string(), RemoteStatus::Active);

        let second = h
            .engine
            .run_at(request(&rule), now() + Duration::hours(1))
            .await
            .unwrap();

        let action = &actions_of(&second.entities[0])[0];
        assert_eq!(action.result, ActionResult::Skipped);
        assert_eq!(
            action.reason.as_deref(),
            Some("execution limit reached: 1/1 in the last 24h")
        );
        assert_eq!(h.platform.mutating_calls().len(), 1);
    }

    #[tokio::test]
    async fn should_fail_cycle_and_release_lock_when_user_has_no_active_account() {
        let user = UserId::new();
        let rule = pause_rule(user);
        let mut setup = Setup::new(user, vec![rule.clone()], Vec::new());
        setup.accounts = Vec::new();
        let h = setup.build();

        let err = h.engine.run_at(request(&rule), now()).await.unwrap_err();

        assert!(matches!(
            err,
            AdPilotError::Configuration(ConfigurationError::NoActiveAdAccount { .. })
        ));
        let log = h.logs.only();
        assert_eq!(log.status, LogStatus::Failed);
        assert!(log.message.unwrap().starts_with("configuration error: no active ad account"));
        let stored = h.rules.get(rule.id);
        assert_eq!(stored.processing_since, None);
        assert_eq!(stored.last_run_status, Some(LogStatus::Failed));
    }

    #[tokio::test]
    async fn should_return_not_found_when_rule_belongs_to_another_user() {
        let owner = UserId::new();
        let rule = pause_rule(owner);
        let h = Setup::new(owner, vec![rule.clone()], Vec::new()).build();

        let err = h
            .engine
            .run_at(
                RunRequest {
                    user_id: UserId::new(),
                    ..request(&rule)
                },
                now(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AdPilotError::NotFound(_)));
        assert!(h.logs.all().is_empty());
    }

    #[tokio::test]
    async fn should_write_failed_log_when_stored_rule_is_unreadable() {
        let user = UserId::new();
        let h = Setup::new(user, Vec::new(), Vec::new()).build();
        let rule_id = RuleId::new();
        h.rules.add_unreadable(rule_id, user);

        let err = h
            .engine
            .run_at(
                RunRequest {
                    rule_id,
                    user_id: user,
                    manual_run: true,
                    dry_run: false,
                },
                now(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AdPilotError::Configuration(_)));
        let log = h.logs.only();
        assert_eq!(log.rule_id, rule_id);
        assert_eq!(log.status, LogStatus::Failed);
        assert!(log.message.unwrap().contains("malformed rule field scope"));
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn should_hide_unreadable_rule_from_another_user() {
        let owner = UserId::new();
        let h = Setup::new(owner, Vec::new(), Vec::new()).build();
        let rule_id = RuleId::new();
        h.rules.add_unreadable(rule_id, owner);

        let err = h
            .engine
            .run_at(
                RunRequest {
                    rule_id,
                    user_id: UserId::new(),
                    manual_run: true,
                    dry_run: false,
                },
                now(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AdPilotError::NotFound(_)));
        assert!(h.logs.all().is_empty());
    }

    #[tokio::test]
    async fn should_roll_labelled_ad_groups_up_to_campaign_scope() {
        let user = UserId::new();
        let label = LabelId::new();
        let rule = Rule::builder()
            .user_id(user)
            .name("Labelled")
            .condition(spend_above(100_000.0))
            .action(pause())
            .target_label(label)
            .build()
            .unwrap();
        let mut setup = Setup::new(
            user,
            vec![rule.clone()],
            vec![
                ad_group_record("act_1", "c1", "g1", today(), 80_000.0, 1.0),
                ad_group_record("act_1", "c1", "g2", today(), 70_000.0, 1.0),
                ad_group_record("act_1", "c2", "g3", today(), 500_000.0, 1.0),
            ],
        );
        setup.labels = InMemoryLabels::with(vec![
            (
                user,
                LabelAssignment {
                    label_id: label,
                    level: Scope::AdGroup,
                    object_id: "g1".to_string(),
                },
            ),
            (
                user,
                LabelAssignment {
                    label_id: label,
                    level: Scope::AdGroup,
                    object_id: "g2".to_string(),
                },
            ),
        ]);
        let h = setup.build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.entities[0].object_id, "c1");
        assert!((report.entities[0].metrics.spend - 150_000.0).abs() < f64::EPSILON);
        let queries = h.metrics.queries.lock().unwrap();
        assert_eq!(queries[0].level, Scope::AdGroup);
        assert_eq!(queries[0].filter.as_ref().unwrap().level, Scope::AdGroup);
    }

    #[tokio::test]
    async fn should_process_remaining_accounts_when_one_metrics_fetch_fails() {
        let user = UserId::new();
        let rule = pause_rule(user);
        let mut setup = Setup::new(
            user,
            vec![rule.clone()],
            vec![
                campaign_record("act_1", "c1", today(), 150_000.0, 3.0),
                campaign_record("act_2", "c2", today(), 150_000.0, 3.0),
            ],
        );
        setup.accounts.push(account(user, "act_2", "VND"));
        setup.metrics = setup.metrics.failing_for("act_1");
        let h = setup.build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        assert_eq!(report.status, LogStatus::Success);
        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.entities[0].object_id, "c2");
    }

    #[tokio::test]
    async fn should_refuse_budget_increase_when_roas_is_below_minimum() {
        let user = UserId::new();
        let rule = Rule::builder()
            .user_id(user)
            .name("Scale winners")
            .condition(spend_above(100_000.0))
            .action(Action::IncreaseBudget(BudgetAdjustment::percentage(20.0)))
            .settings(AdvancedSettings {
                min_roas_for_increase: Some(1.5),
                ..AdvancedSettings::default()
            })
            .build()
            .unwrap();
        let mut setup = Setup::new(
            user,
            vec![rule.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        );
        setup.platform = SpyPlatform::default().with_daily_budget("c1", 500_000.0);
        let h = setup.build();

        let report = h.engine.run_at(request(&rule), now()).await.unwrap();

        let action = &actions_of(&report.entities[0])[0];
        assert_eq!(action.result, ActionResult::Skipped);
        assert!(action.reason.as_deref().unwrap().starts_with("roas 0 is below"));
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn should_run_only_schedulable_rules_when_scheduler_ticks() {
        let user = UserId::new();
        let scheduled = pause_rule(user);
        let mut manual_only = pause_rule(user);
        manual_only.settings.auto_schedule = false;
        let mut inactive = pause_rule(user);
        inactive.active = false;
        let h = Setup::new(
            user,
            vec![scheduled, manual_only, inactive],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        )
        .build();

        let report = h.engine.run_scheduled(now()).await.unwrap();

        assert_eq!(
            report,
            ScheduleReport {
                succeeded: 1,
                skipped: 0,
                failed: 0
            }
        );
        assert_eq!(h.logs.all().len(), 1);
    }

    #[tokio::test]
    async fn should_keep_scheduling_other_rules_when_one_is_unreadable() {
        let user = UserId::new();
        let scheduled = pause_rule(user);
        let h = Setup::new(
            user,
            vec![scheduled.clone()],
            vec![campaign_record("act_1", "c1", today(), 150_000.0, 3.0)],
        )
        .build();
        h.rules.add_unreadable(RuleId::new(), user);

        let report = h.engine.run_scheduled(now()).await.unwrap();

        assert_eq!(
            report,
            ScheduleReport {
                succeeded: 1,
                skipped: 0,
                failed: 1
            }
        );
        assert_eq!(
            h.rules.get(scheduled.id).last_run_status,
            Some(LogStatus::Success)
        );
        let mut statuses: Vec<_> = h.logs.all().into_iter().map(|log| log.status).collect();
        statuses.sort_by_key(|status| status.as_str());
        assert_eq!(statuses, vec![LogStatus::Failed, LogStatus::Success]);
    }
}
