//! Action: the effect a matching rule or step has on a platform object.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::lenient;

/// An operation to perform when a rule or step matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Pause the object, optionally scheduling an automatic revert.
    #[serde(alias = "pause")]
    TurnOff {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auto_revert: Option<AutoRevert>,
    },
    /// Activate the object.
    #[serde(alias = "activate")]
    TurnOn,
    IncreaseBudget(BudgetAdjustment),
    DecreaseBudget(BudgetAdjustment),
    /// Override/protect: suppresses every other action for the object.
    #[serde(alias = "override", alias = "protect")]
    Keep,
}

impl Action {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::TurnOff { .. } => ActionKind::TurnOff,
            Self::TurnOn => ActionKind::TurnOn,
            Self::IncreaseBudget(_) => ActionKind::IncreaseBudget,
            Self::DecreaseBudget(_) => ActionKind::DecreaseBudget,
            Self::Keep => ActionKind::Keep,
        }
    }

    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Direction and parameters of a budget action.
    #[must_use]
    pub fn budget_change(&self) -> Option<(BudgetDirection, &BudgetAdjustment)> {
        match self {
            Self::IncreaseBudget(adj) => Some((BudgetDirection::Increase, adj)),
            Self::DecreaseBudget(adj) => Some((BudgetDirection::Decrease, adj)),
            _ => None,
        }
    }

    /// Check parameter invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidBudgetValue`] when a budget value is
    /// negative or not finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some((_, adj)) = self.budget_change() {
            if !adj.value.is_finite() || adj.value < 0.0 {
                return Err(ValidationError::InvalidBudgetValue);
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TurnOff {
                auto_revert: Some(revert),
            } => write!(f, "turn_off(revert {})", revert.schedule),
            Self::IncreaseBudget(adj) | Self::DecreaseBudget(adj) => {
                write!(f, "{}({adj})", self.kind())
            }
            _ => self.kind().fmt(f),
        }
    }
}

/// Fieldless discriminant of [`Action`], used as a history/cooldown key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TurnOff,
    TurnOn,
    IncreaseBudget,
    DecreaseBudget,
    Keep,
}

impl ActionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TurnOff => "turn_off",
            Self::TurnOn => "turn_on",
            Self::IncreaseBudget => "increase_budget",
            Self::DecreaseBudget => "decrease_budget",
            Self::Keep => "keep",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "turn_off" => Ok(Self::TurnOff),
            "turn_on" => Ok(Self::TurnOn),
            "increase_budget" => Ok(Self::IncreaseBudget),
            "decrease_budget" => Ok(Self::DecreaseBudget),
            "keep" => Ok(Self::Keep),
            other => Err(format!("unknown action kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDirection {
    Increase,
    Decrease,
}

/// How a budget adjustment value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    #[default]
    Percentage,
    #[serde(alias = "fixed", alias = "amount")]
    Absolute,
}

/// Parameters of an `increase_budget` / `decrease_budget` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAdjustment {
    #[serde(default, deserialize_with = "lenient::number")]
    pub value: f64,
    #[serde(default)]
    pub mode: AdjustmentMode,
    /// Currency the absolute `value` is expressed in, when the author pinned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl BudgetAdjustment {
    #[must_use]
    pub fn percentage(value: f64) -> Self {
        Self {
            value,
            mode: AdjustmentMode::Percentage,
            currency: None,
        }
    }

    #[must_use]
    pub fn absolute(value: f64) -> Self {
        Self {
            value,
            mode: AdjustmentMode::Absolute,
            currency: None,
        }
    }
}

impl std::fmt::Display for BudgetAdjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            AdjustmentMode::Percentage => write!(f, "{}%", self.value),
            AdjustmentMode::Absolute => match &self.currency {
                Some(code) => write!(f, "{} {code}", self.value),
                None => write!(f, "{}", self.value),
            },
        }
    }
}

/// Automatic reactivation following a `turn_off`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoRevert {
    #[serde(flatten)]
    pub schedule: RevertSchedule,
    #[serde(default)]
    pub revert_action: RevertAction,
}

/// When an auto-revert becomes due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RevertSchedule {
    /// Next occurrence of a wall-clock time in the account timezone.
    AtTime { at: TimeOfDay },
    /// A fixed delay after the `turn_off` succeeded.
    AfterHours {
        #[serde(deserialize_with = "lenient::number")]
        hours: f64,
    },
}

impl std::fmt::Display for RevertSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AtTime { at } => write!(f, "at {at}"),
            Self::AfterHours { hours } => write!(f, "after {hours}h"),
        }
    }
}

/// The action replayed when a revert becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertAction {
    #[default]
    TurnOn,
    TurnOff,
}

impl RevertAction {
    #[must_use]
    pub fn into_action(self) -> Action {
        match self {
            Self::TurnOn => Action::TurnOn,
            Self::TurnOff => Action::TurnOff { auto_revert: None },
        }
    }

    #[must_use]
    pub fn kind(self) -> ActionKind {
        self.into_action().kind()
    }
}

/// `HH:MM` wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimeOfDay`] when out of range.
    pub fn new(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTimeOfDay(format!(
                "{hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    #[must_use]
    pub fn hour(self) -> u32 {
        self.hour
    }

    #[must_use]
    pub fn minute(self) -> u32 {
        self.minute
    }

    #[must_use]
    pub fn as_naive_time(self) -> chrono::NaiveTime {
        chrono::NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(chrono::NaiveTime::MIN)
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimeOfDay(s.to_string());
        let mut parts = s.trim().splitn(3, ':');
        let hour = parts.next().and_then(|h| h.parse().ok()).ok_or_else(invalid)?;
        let minute = parts.next().and_then(|m| m.parse().ok()).ok_or_else(invalid)?;
        if let Some(seconds) = parts.next() {
            seconds.parse::<u32>().map_err(|_| invalid())?;
        }
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
