//! Execution log: one entry per rule-evaluation cycle, plus the per-action
//! history rows the cooldown guard counts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::{ExecutionLogId, RuleId, StepId};
use crate::metrics::AggregatedEntity;
use crate::rule::{ActionKind, ActionSource};
use crate::time::Timestamp;

/// Lifecycle of a log entry: created `pending`, finished exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Pending,
    Success,
    Skipped,
    Failed,
}

impl LogStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "skipped" => Ok(Self::Skipped),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown log status {other:?}")),
        }
    }
}

/// What happened to one action on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    Executed,
    /// Dry run: the action would have been sent.
    WouldExecute,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReport {
    pub action: ActionKind,
    pub source: ActionSource,
    pub result: ActionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Platform payload, computed budget, scheduled revert, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ActionReport {
    #[must_use]
    pub fn new(action: ActionKind, source: ActionSource, result: ActionResult) -> Self {
        Self {
            action,
            source,
            result,
            reason: None,
            payload: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Resolution outcome recorded for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntityOutcome {
    Blocked { step_id: StepId, order: u32 },
    NoMatch,
    Matched { actions: Vec<ActionReport> },
}

/// Key figures captured at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub spend: f64,
    pub results: f64,
    pub cost_per_result: f64,
    pub roas: f64,
}

impl From<&AggregatedEntity> for MetricSnapshot {
    fn from(entity: &AggregatedEntity) -> Self {
        Self {
            spend: entity.spend,
            results: entity.results,
            cost_per_result: entity.cost_per_result,
            roas: entity.sales.roas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub object_id: String,
    pub name: String,
    pub ad_account_id: String,
    pub metrics: MetricSnapshot,
    #[serde(flatten)]
    pub outcome: EntityOutcome,
}

impl EntityReport {
    #[must_use]
    pub fn new(entity: &AggregatedEntity, outcome: EntityOutcome) -> Self {
        Self {
            object_id: entity.object_id.clone(),
            name: entity.name.clone(),
            ad_account_id: entity.ad_account_id.clone(),
            metrics: MetricSnapshot::from(entity),
            outcome,
        }
    }

    /// Actions with a mutating result (or would-be result on a dry run).
    #[must_use]
    pub fn executed_count(&self) -> u32 {
        match &self.outcome {
            EntityOutcome::Matched { actions } => {
                let n = actions
                    .iter()
                    .filter(|a| matches!(a.result, ActionResult::Executed | ActionResult::WouldExecute))
                    .count();
                u32::try_from(n).unwrap_or(u32::MAX)
            }
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self.outcome, EntityOutcome::Matched { .. })
    }
}

/// One rule-evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: ExecutionLogId,
    pub rule_id: RuleId,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub status: LogStatus,
    pub dry_run: bool,
    pub matched_count: u32,
    pub executed_count: u32,
    pub details: Vec<EntityReport>,
    pub message: Option<String>,
}

impl ExecutionLog {
    /// Fresh entry in `pending` state.
    #[must_use]
    pub fn pending(rule_id: RuleId, dry_run: bool, started_at: Timestamp) -> Self {
        Self {
            id: ExecutionLogId::new(),
            rule_id,
            started_at,
            finished_at: None,
            status: LogStatus::Pending,
            dry_run,
            matched_count: 0,
            executed_count: 0,
            details: Vec::new(),
            message: None,
        }
    }
}

/// Terminal update applied to a pending [`ExecutionLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogCompletion {
    pub status: LogStatus,
    pub finished_at: Timestamp,
    pub matched_count: u32,
    pub executed_count: u32,
    pub details: Vec<EntityReport>,
    pub message: Option<String>,
}

impl LogCompletion {
    /// Summarise per-object reports into a `success` completion.
    #[must_use]
    pub fn from_reports(details: Vec<EntityReport>, finished_at: Timestamp) -> Self {
        let matched = details.iter().filter(|d| d.is_matched()).count();
        let executed = details.iter().map(EntityReport::executed_count).sum();
        Self {
            status: LogStatus::Success,
            finished_at,
            matched_count: u32::try_from(matched).unwrap_or(u32::MAX),
            executed_count: executed,
            details,
            message: None,
        }
    }

    /// Completion without detail, for `skipped` and `failed` cycles.
    #[must_use]
    pub fn bare(status: LogStatus, message: impl Into<String>, finished_at: Timestamp) -> Self {
        Self {
            status,
            finished_at,
            matched_count: 0,
            executed_count: 0,
            details: Vec::new(),
            message: Some(message.into()),
        }
    }
}

/// A successful, non-dry-run mutating action, counted by the cooldown guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionExecution {
    pub rule_id: RuleId,
    pub object_id: String,
    pub action: ActionKind,
    pub executed_at: Timestamp,
}
