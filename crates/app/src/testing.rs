//! In-memory port implementations shared by the use-case tests.
//!
//! Every fake keeps its state behind an `Arc`, so a test can hand a clone to
//! the service under test and inspect the original afterwards.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use adpilot_domain::account::{AdAccount, Budget, BudgetKind, RemoteStatus, TargetStatus};
use adpilot_domain::error::{AdPilotError, ConfigurationError, ExternalApiError};
use adpilot_domain::execution_log::{
    ActionExecution, ExecutionLog, LogCompletion, LogStatus,
};
use adpilot_domain::id::{ExecutionLogId, LabelId, PendingRevertId, RuleId, UserId};
use adpilot_domain::label::LabelAssignment;
use adpilot_domain::metrics::{RawPerformanceRecord, SalesRecord};
use adpilot_domain::revert::{PendingRevert, RevertStatus};
use adpilot_domain::rule::{ActionKind, Rule, Scope};
use adpilot_domain::time::Timestamp;
use chrono::NaiveDate;

use crate::ports::{
    ActionHistoryStore, AdAccountStore, AdPlatform, ExecutionLogStore, LabelStore, MetricsQuery,
    MetricsStore, PendingRevertStore, RuleRef, RuleRepository, SalesStore,
};

fn storage_failure(message: &str) -> AdPilotError {
    AdPilotError::Storage(message.to_string().into())
}

// ── Rules ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryRuleRepo {
    pub store: Arc<Mutex<HashMap<RuleId, Rule>>>,
    /// Stored rules whose definition cannot be decoded, with their owner.
    pub unreadable: Arc<Mutex<HashMap<RuleId, UserId>>>,
}

impl InMemoryRuleRepo {
    pub fn with(rules: Vec<Rule>) -> Self {
        let map: HashMap<_, _> = rules.into_iter().map(|r| (r.id, r)).collect();
        Self {
            store: Arc::new(Mutex::new(map)),
            unreadable: Arc::default(),
        }
    }

    /// Store a rule that exists but fails to decode.
    pub fn add_unreadable(&self, id: RuleId, owner: UserId) {
        self.unreadable.lock().unwrap().insert(id, owner);
    }

    pub fn get(&self, id: RuleId) -> Rule {
        self.store.lock().unwrap()[&id].clone()
    }
}

impl RuleRepository for InMemoryRuleRepo {
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send {
        self.store.lock().unwrap().insert(rule.id, rule.clone());
        async { Ok(rule) }
    }

    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AdPilotError>> + Send {
        let r = if self.unreadable.lock().unwrap().contains_key(&id) {
            Err(ConfigurationError::MalformedRuleField {
                field: "scope",
                reason: "unknown scope \"portfolio\"".to_string(),
            }
            .into())
        } else {
            Ok(self.store.lock().unwrap().get(&id).cloned())
        };
        async { r }
    }

    fn owner_of(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<UserId>, AdPilotError>> + Send {
        let owner = self
            .store
            .lock()
            .unwrap()
            .get(&id)
            .map(|r| r.user_id)
            .or_else(|| self.unreadable.lock().unwrap().get(&id).copied());
        async move { Ok(owner) }
    }

    fn get_schedulable(&self) -> impl Future<Output = Result<Vec<RuleRef>, AdPilotError>> + Send {
        let mut refs: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_schedulable())
            .map(|r| RuleRef {
                id: r.id,
                user_id: r.user_id,
            })
            .collect();
        refs.extend(
            self.unreadable
                .lock()
                .unwrap()
                .iter()
                .map(|(&id, &user_id)| RuleRef { id, user_id }),
        );
        async { Ok(refs) }
    }

    fn try_acquire_lock(
        &self,
        id: RuleId,
        now: Timestamp,
        stale_before: Timestamp,
    ) -> impl Future<Output = Result<bool, AdPilotError>> + Send {
        let mut store = self.store.lock().unwrap();
        let acquired = match store.get_mut(&id) {
            Some(rule) if rule.processing_since.is_none_or(|since| since < stale_before) => {
                rule.processing_since = Some(now);
                true
            }
            _ => false,
        };
        async move { Ok(acquired) }
    }

    fn release_lock(&self, id: RuleId) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        if let Some(rule) = self.store.lock().unwrap().get_mut(&id) {
            rule.processing_since = None;
        }
        async { Ok(()) }
    }

    fn update_last_run(
        &self,
        id: RuleId,
        status: LogStatus,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        if let Some(rule) = self.store.lock().unwrap().get_mut(&id) {
            rule.last_run_status = Some(status);
            rule.last_run_at = Some(at);
        }
        async { Ok(()) }
    }
}

// ── Accounts & labels ──────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryAccounts {
    pub accounts: Arc<Vec<AdAccount>>,
}

impl InMemoryAccounts {
    pub fn with(accounts: Vec<AdAccount>) -> Self {
        Self {
            accounts: Arc::new(accounts),
        }
    }
}

impl AdAccountStore for InMemoryAccounts {
    fn active_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<AdAccount>, AdPilotError>> + Send {
        let r: Vec<_> = self
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id && a.active)
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn get_by_id(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<Option<AdAccount>, AdPilotError>> + Send {
        let r = self.accounts.iter().find(|a| a.id == account_id).cloned();
        async { Ok(r) }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryLabels {
    pub assignments: Arc<Vec<(UserId, LabelAssignment)>>,
}

impl InMemoryLabels {
    pub fn with(assignments: Vec<(UserId, LabelAssignment)>) -> Self {
        Self {
            assignments: Arc::new(assignments),
        }
    }
}

impl LabelStore for InMemoryLabels {
    fn assignments(
        &self,
        user_id: UserId,
        labels: &[LabelId],
    ) -> impl Future<Output = Result<Vec<LabelAssignment>, AdPilotError>> + Send {
        let r: Vec<_> = self
            .assignments
            .iter()
            .filter(|(owner, a)| *owner == user_id && labels.contains(&a.label_id))
            .map(|(_, a)| a.clone())
            .collect();
        async { Ok(r) }
    }
}

// ── Metrics & sales ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryMetrics {
    pub records: Arc<Vec<RawPerformanceRecord>>,
    pub failing_accounts: Arc<HashSet<String>>,
    pub queries: Arc<Mutex<Vec<MetricsQuery>>>,
}

impl InMemoryMetrics {
    pub fn with(records: Vec<RawPerformanceRecord>) -> Self {
        Self {
            records: Arc::new(records),
            ..Self::default()
        }
    }

    pub fn failing_for(mut self, account_id: &str) -> Self {
        let mut failing = (*self.failing_accounts).clone();
        failing.insert(account_id.to_string());
        self.failing_accounts = Arc::new(failing);
        self
    }
}

impl MetricsStore for InMemoryMetrics {
    fn fetch(
        &self,
        query: &MetricsQuery,
    ) -> impl Future<Output = Result<Vec<RawPerformanceRecord>, AdPilotError>> + Send {
        self.queries.lock().unwrap().push(query.clone());
        let result = if self.failing_accounts.contains(&query.ad_account_id) {
            Err(storage_failure("metrics unavailable"))
        } else {
            Ok(self
                .records
                .iter()
                .filter(|r| r.ad_account_id == query.ad_account_id)
                .filter(|r| r.level == query.level)
                .filter(|r| query.window.contains(r.date))
                .filter(|r| {
                    query.filter.as_ref().is_none_or(|f| {
                        r.object_id(f.level)
                            .is_some_and(|id| f.ids.iter().any(|wanted| wanted == id))
                    })
                })
                .cloned()
                .collect())
        };
        async { result }
    }
}

#[derive(Clone, Default)]
pub struct InMemorySales {
    pub records: Arc<HashMap<(String, Scope), Vec<SalesRecord>>>,
    pub failing: bool,
    pub lookups: Arc<Mutex<Vec<(String, Scope)>>>,
}

impl InMemorySales {
    pub fn with(records: Vec<(Scope, SalesRecord)>) -> Self {
        let mut map: HashMap<(String, Scope), Vec<SalesRecord>> = HashMap::new();
        for (level, record) in records {
            map.entry((record.object_id.clone(), level))
                .or_default()
                .push(record);
        }
        Self {
            records: Arc::new(map),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

impl SalesStore for InMemorySales {
    fn find_by_object(
        &self,
        object_id: &str,
        level: Scope,
    ) -> impl Future<Output = Result<Vec<SalesRecord>, AdPilotError>> + Send {
        self.lookups
            .lock()
            .unwrap()
            .push((object_id.to_string(), level));
        let result = if self.failing {
            Err(storage_failure("crm unavailable"))
        } else {
            Ok(self
                .records
                .get(&(object_id.to_string(), level))
                .cloned()
                .unwrap_or_default())
        };
        async { result }
    }
}

// ── Execution log, history, reverts ────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryLogs {
    pub store: Arc<Mutex<HashMap<ExecutionLogId, ExecutionLog>>>,
    pub fail_full_finish: bool,
}

impl InMemoryLogs {
    pub fn only(&self) -> ExecutionLog {
        let store = self.store.lock().unwrap();
        assert_eq!(store.len(), 1, "expected exactly one log entry");
        store.values().next().cloned().unwrap()
    }

    pub fn all(&self) -> Vec<ExecutionLog> {
        self.store.lock().unwrap().values().cloned().collect()
    }
}

impl ExecutionLogStore for InMemoryLogs {
    fn create(
        &self,
        log: ExecutionLog,
    ) -> impl Future<Output = Result<ExecutionLog, AdPilotError>> + Send {
        self.store.lock().unwrap().insert(log.id, log.clone());
        async { Ok(log) }
    }

    fn finish(
        &self,
        id: ExecutionLogId,
        completion: &LogCompletion,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        let result = if self.fail_full_finish {
            Err(storage_failure("detail payload too large"))
        } else {
            if let Some(log) = self.store.lock().unwrap().get_mut(&id) {
                log.status = completion.status;
                log.finished_at = Some(completion.finished_at);
                log.matched_count = completion.matched_count;
                log.executed_count = completion.executed_count;
                log.details.clone_from(&completion.details);
                log.message.clone_from(&completion.message);
            }
            Ok(())
        };
        async { result }
    }

    fn finish_minimal(
        &self,
        id: ExecutionLogId,
        status: LogStatus,
        message: Option<&str>,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        if let Some(log) = self.store.lock().unwrap().get_mut(&id) {
            log.status = status;
            log.finished_at = Some(at);
            log.message = message.map(str::to_string);
        }
        async { Ok(()) }
    }

    fn recent_for_rule(
        &self,
        rule_id: RuleId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ExecutionLog>, AdPilotError>> + Send {
        let mut r: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.rule_id == rule_id)
            .cloned()
            .collect();
        r.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        r.truncate(limit as usize);
        async { Ok(r) }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryHistory {
    pub rows: Arc<Mutex<Vec<ActionExecution>>>,
}

impl InMemoryHistory {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

impl ActionHistoryStore for InMemoryHistory {
    fn record(
        &self,
        execution: ActionExecution,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        self.rows.lock().unwrap().push(execution);
        async { Ok(()) }
    }

    fn count_since(
        &self,
        rule_id: RuleId,
        object_id: &str,
        action: ActionKind,
        since: Timestamp,
    ) -> impl Future<Output = Result<u32, AdPilotError>> + Send {
        let n = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.rule_id == rule_id
                    && r.object_id == object_id
                    && r.action == action
                    && r.executed_at >= since
            })
            .count();
        let n = u32::try_from(n).unwrap();
        async move { Ok(n) }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryReverts {
    pub rows: Arc<Mutex<Vec<PendingRevert>>>,
}

impl InMemoryReverts {
    pub fn with(rows: Vec<PendingRevert>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    pub fn all(&self) -> Vec<PendingRevert> {
        self.rows.lock().unwrap().clone()
    }
}

impl PendingRevertStore for InMemoryReverts {
    fn create(
        &self,
        revert: PendingRevert,
    ) -> impl Future<Output = Result<PendingRevert, AdPilotError>> + Send {
        self.rows.lock().unwrap().push(revert.clone());
        async { Ok(revert) }
    }

    fn due(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<PendingRevert>, AdPilotError>> + Send {
        let mut r: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_due(now))
            .cloned()
            .collect();
        r.sort_by_key(|p| p.revert_at);
        r.truncate(limit as usize);
        async { Ok(r) }
    }

    fn mark_done(
        &self,
        id: PendingRevertId,
        _at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|p| p.id == id) {
            row.status = RevertStatus::Done;
        }
        async { Ok(()) }
    }

    fn mark_failed(
        &self,
        id: PendingRevertId,
        error: &str,
        _at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|p| p.id == id) {
            row.status = RevertStatus::Failed;
            row.error = Some(error.to_string());
        }
        async { Ok(()) }
    }
}

// ── Spy platform ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    GetStatus(String),
    SetStatus(String, TargetStatus),
    GetBudget(String),
    SetBudget(String, f64),
}

#[derive(Clone, Default)]
pub struct SpyPlatform {
    pub statuses: Arc<Mutex<HashMap<String, RemoteStatus>>>,
    pub budgets: Arc<Mutex<HashMap<String, Budget>>>,
    pub rejected: Arc<HashSet<String>>,
    pub hang: bool,
    pub calls: Arc<Mutex<Vec<PlatformCall>>>,
}

impl SpyPlatform {
    pub fn with_status(self, object_id: &str, status: RemoteStatus) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(object_id.to_string(), status);
        self
    }

    pub fn with_daily_budget(self, object_id: &str, amount: f64) -> Self {
        self.budgets.lock().unwrap().insert(
            object_id.to_string(),
            Budget {
                amount,
                kind: BudgetKind::Daily,
            },
        );
        self
    }

    pub fn rejecting(mut self, object_id: &str) -> Self {
        let mut rejected = (*self.rejected).clone();
        rejected.insert(object_id.to_string());
        self.rejected = Arc::new(rejected);
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutating_calls(&self) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, PlatformCall::SetStatus(..) | PlatformCall::SetBudget(..)))
            .collect()
    }

    fn respond<T: Send>(
        &self,
        call: PlatformCall,
        object_id: &str,
        ok: T,
    ) -> impl Future<Output = Result<T, AdPilotError>> + Send {
        self.calls.lock().unwrap().push(call);
        let result = if self.rejected.contains(object_id) {
            Err(ExternalApiError::Rejected {
                status: 400,
                payload: serde_json::json!({"error": {"message": "Invalid parameter", "code": 100}}),
            }
            .into())
        } else {
            Ok(ok)
        };
        let hang = self.hang;
        async move {
            if hang {
                std::future::pending::<()>().await;
            }
            result
        }
    }
}

impl AdPlatform for SpyPlatform {
    fn get_status(
        &self,
        _credential: &str,
        object_id: &str,
    ) -> impl Future<Output = Result<RemoteStatus, AdPilotError>> + Send {
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(object_id)
            .cloned()
            .unwrap_or(RemoteStatus::Active);
        self.respond(PlatformCall::GetStatus(object_id.to_string()), object_id, status)
    }

    fn set_status(
        &self,
        _credential: &str,
        object_id: &str,
        status: TargetStatus,
    ) -> impl Future<Output = Result<serde_json::Value, AdPilotError>> + Send {
        if !self.rejected.contains(object_id) {
            let remote = match status {
                TargetStatus::Active => RemoteStatus::Active,
                TargetStatus::Paused => RemoteStatus::Paused,
            };
            self.statuses
                .lock()
                .unwrap()
                .insert(object_id.to_string(), remote);
        }
        self.respond(
            PlatformCall::SetStatus(object_id.to_string(), status),
            object_id,
            serde_json::json!({"success": true}),
        )
    }

    fn get_budget(
        &self,
        _credential: &str,
        object_id: &str,
    ) -> impl Future<Output = Result<Option<Budget>, AdPilotError>> + Send {
        let budget = self.budgets.lock().unwrap().get(object_id).copied();
        self.respond(PlatformCall::GetBudget(object_id.to_string()), object_id, budget)
    }

    fn set_budget(
        &self,
        _credential: &str,
        object_id: &str,
        budget: Budget,
    ) -> impl Future<Output = Result<serde_json::Value, AdPilotError>> + Send {
        if !self.rejected.contains(object_id) {
            self.budgets
                .lock()
                .unwrap()
                .insert(object_id.to_string(), budget);
        }
        self.respond(
            PlatformCall::SetBudget(object_id.to_string(), budget.amount),
            object_id,
            serde_json::json!({"success": true}),
        )
    }
}

// ── Fixtures ───────────────────────────────────────────────────────

pub fn account(user_id: UserId, id: &str, currency: &str) -> AdAccount {
    AdAccount {
        id: id.to_string(),
        user_id,
        name: format!("Account {id}"),
        currency: Some(currency.to_string()),
        timezone: Some("Asia/Ho_Chi_Minh".to_string()),
        access_token: Some(format!("token-{id}")),
        active: true,
    }
}

pub fn campaign_record(
    account_id: &str,
    campaign_id: &str,
    date: NaiveDate,
    spend: f64,
    results: f64,
) -> RawPerformanceRecord {
    RawPerformanceRecord {
        level: Scope::Campaign,
        ad_account_id: account_id.to_string(),
        date,
        campaign_id: Some(campaign_id.to_string()),
        campaign_name: Some(format!("Campaign {campaign_id}")),
        ad_group_id: None,
        ad_group_name: None,
        ad_id: None,
        ad_name: None,
        spend,
        impressions: 1_000.0,
        clicks: 50.0,
        results,
    }
}

pub fn ad_group_record(
    account_id: &str,
    campaign_id: &str,
    ad_group_id: &str,
    date: NaiveDate,
    spend: f64,
    results: f64,
) -> RawPerformanceRecord {
    RawPerformanceRecord {
        level: Scope::AdGroup,
        ad_group_id: Some(ad_group_id.to_string()),
        ad_group_name: Some(format!("Ad group {ad_group_id}")),
        ..campaign_record(account_id, campaign_id, date, spend, results)
    }
}
