//! Rule: "if metric condition then action" automation over ad objects.
//!
//! A [`Rule`] has a root condition set and action list, plus an ordered list
//! of dependent [`Step`]s. Each step carries exactly one [`Action`]; a step
//! whose action is [`Action::Keep`] protects the object from every other
//! action in the cycle. See [`resolve`] for the precedence rules.

mod action;
mod condition;
mod resolution;
mod time_range;

pub use action::{
    Action, ActionKind, AdjustmentMode, AutoRevert, BudgetAdjustment, BudgetDirection,
    RevertAction, RevertSchedule, TimeOfDay,
};
pub use condition::{Condition, MatchMode, MetricSource, Operator, evaluate};
pub use resolution::{ActionSource, PlannedAction, Resolution, resolve};
pub use time_range::{DateWindow, TimeRange};

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AdPilotError, ValidationError};
use crate::execution_log::LogStatus;
use crate::id::{LabelId, RuleId, StepId, UserId};
use crate::time::Timestamp;

/// Hierarchy level a rule evaluates and acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    Campaign,
    #[serde(alias = "adset", alias = "ad_set", alias = "ad_group", alias = "adgroup")]
    AdGroup,
    Ad,
}

impl Scope {
    pub const ALL: [Self; 3] = [Self::Campaign, Self::AdGroup, Self::Ad];

    /// Position in the hierarchy, campaigns first.
    #[must_use]
    pub fn depth(self) -> u8 {
        match self {
            Self::Campaign => 0,
            Self::AdGroup => 1,
            Self::Ad => 2,
        }
    }

    /// `true` when `self` sits below `other` in the hierarchy.
    #[must_use]
    pub fn is_finer_than(self, other: Self) -> bool {
        self.depth() > other.depth()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Campaign => "campaign",
            Self::AdGroup => "ad-group",
            Self::Ad => "ad",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "campaign" => Ok(Self::Campaign),
            "ad-group" | "ad_group" | "adgroup" | "adset" | "ad_set" => Ok(Self::AdGroup),
            "ad" => Ok(Self::Ad),
            _ => Err(ValidationError::InvalidScope(s.to_string())),
        }
    }
}

/// How a step relates to the root rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepLogic {
    /// Only evaluated when the root matched.
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    /// Evaluated independently of the root.
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// A dependent condition + single action fragment of a [`Rule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub id: StepId,
    pub order: u32,
    #[serde(default)]
    pub logic: StepLogic,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub match_mode: MatchMode,
    pub action: Action,
}

impl Step {
    #[must_use]
    pub fn new(order: u32, logic: StepLogic, action: Action) -> Self {
        Self {
            id: StepId::new(),
            order,
            logic,
            conditions: Vec::new(),
            match_mode: MatchMode::All,
            action,
        }
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    #[must_use]
    pub fn matches(&self, source: &impl MetricSource) -> bool {
        evaluate(source, &self.conditions, self.match_mode)
    }
}

/// Execution limits, safety caps and scheduling flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    pub enable_execution_limit: bool,
    pub max_executions_per_object: u32,
    pub cooldown_hours: f64,
    pub reset_daily: bool,
    /// Budget floor in whole currency units.
    pub min_budget: Option<f64>,
    /// Budget cap in whole currency units.
    pub max_budget: Option<f64>,
    /// Budget increases are refused below this ROAS.
    pub min_roas_for_increase: Option<f64>,
    pub auto_schedule: bool,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            enable_execution_limit: false,
            max_executions_per_object: 1,
            cooldown_hours: 24.0,
            reset_daily: false,
            min_budget: None,
            max_budget: None,
            min_roas_for_increase: None,
            auto_schedule: true,
        }
    }
}

/// A user-defined automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub user_id: UserId,
    pub name: String,
    pub active: bool,
    pub scope: Scope,
    pub time_range: TimeRange,
    pub conditions: Vec<Condition>,
    pub match_mode: MatchMode,
    pub actions: Vec<Action>,
    pub steps: Vec<Step>,
    pub target_labels: Vec<LabelId>,
    pub settings: AdvancedSettings,
    pub last_run_at: Option<Timestamp>,
    pub last_run_status: Option<LogStatus>,
    pub processing_since: Option<Timestamp>,
}

impl Rule {
    /// Create a builder for constructing a [`Rule`].
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - there is neither a root action nor a step ([`ValidationError::NoActions`])
    /// - two steps share an `order` ([`ValidationError::DuplicateStepOrder`])
    /// - a budget action carries an unusable value ([`ValidationError::InvalidBudgetValue`])
    pub fn validate(&self) -> Result<(), AdPilotError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.actions.is_empty() && self.steps.is_empty() {
            return Err(ValidationError::NoActions.into());
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.order) {
                return Err(ValidationError::DuplicateStepOrder { order: step.order }.into());
            }
        }
        self.actions
            .iter()
            .chain(self.steps.iter().map(|s| &s.action))
            .try_for_each(Action::validate)?;
        Ok(())
    }

    /// Steps in ascending `order`.
    #[must_use]
    pub fn sorted_steps(&self) -> Vec<&Step> {
        let mut steps: Vec<&Step> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }

    #[must_use]
    pub fn root_matches(&self, source: &impl MetricSource) -> bool {
        evaluate(source, &self.conditions, self.match_mode)
    }

    /// `true` when the periodic scheduler should pick this rule up.
    #[must_use]
    pub fn is_schedulable(&self) -> bool {
        self.active && self.settings.auto_schedule
    }
}

/// Step-by-step builder for [`Rule`].
#[derive(Debug, Default)]
pub struct RuleBuilder {
    id: Option<RuleId>,
    user_id: Option<UserId>,
    name: Option<String>,
    active: Option<bool>,
    scope: Option<Scope>,
    time_range: Option<TimeRange>,
    conditions: Vec<Condition>,
    match_mode: Option<MatchMode>,
    actions: Vec<Action>,
    steps: Vec<Step>,
    target_labels: Vec<LabelId>,
    settings: Option<AdvancedSettings>,
}

impl RuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn target_label(mut self, label: LabelId) -> Self {
        self.target_labels.push(label);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: AdvancedSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Consume the builder, validate, and return a [`Rule`].
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::Validation`] if the rule breaks an invariant.
    pub fn build(self) -> Result<Rule, AdPilotError> {
        let rule = Rule {
            id: self.id.unwrap_or_default(),
            user_id: self.user_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            active: self.active.unwrap_or(true),
            scope: self.scope.unwrap_or(Scope::Campaign),
            time_range: self.time_range.unwrap_or_default(),
            conditions: self.conditions,
            match_mode: self.match_mode.unwrap_or_default(),
            actions: self.actions,
            steps: self.steps,
            target_labels: self.target_labels,
            settings: self.settings.unwrap_or_default(),
            last_run_at: None,
            last_run_status: None,
            processing_since: None,
        };
        rule.validate()?;
        Ok(rule)
    }
}
