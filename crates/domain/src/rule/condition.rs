//! Condition: a metric comparison tested against an aggregated entity.

use serde::{Deserialize, Serialize};

use crate::lenient;

/// Anything that can answer "what is the value of metric `name`?".
pub trait MetricSource {
    /// Value of the named metric, `None` when the source does not know it.
    fn metric(&self, name: &str) -> Option<f64>;
}

/// Comparison operator. Symbolic and word forms are both accepted.
///
/// An operator that is not recognised is kept verbatim and never holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Equal,
    NotEqual,
    Unrecognized(String),
}

impl From<String> for Operator {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            ">" | "gt" | "greater_than" => Self::GreaterThan,
            ">=" | "gte" | "greater_than_or_equal" | "greater_or_equal" => Self::GreaterOrEqual,
            "<" | "lt" | "less_than" => Self::LessThan,
            "<=" | "lte" | "less_than_or_equal" | "less_or_equal" => Self::LessOrEqual,
            "=" | "==" | "eq" | "equal" | "equals" => Self::Equal,
            "!=" | "<>" | "ne" | "neq" | "not_equal" | "not_equals" => Self::NotEqual,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.to_string()
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterThan => f.write_str(">"),
            Self::GreaterOrEqual => f.write_str(">="),
            Self::LessThan => f.write_str("<"),
            Self::LessOrEqual => f.write_str("<="),
            Self::Equal => f.write_str("="),
            Self::NotEqual => f.write_str("!="),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

impl Operator {
    /// Apply the operator to `actual <op> threshold`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn compare(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => actual > threshold,
            Self::GreaterOrEqual => actual >= threshold,
            Self::LessThan => actual < threshold,
            Self::LessOrEqual => actual <= threshold,
            Self::Equal => actual == threshold,
            Self::NotEqual => actual != threshold,
            Self::Unrecognized(_) => false,
        }
    }
}

/// How a list of conditions combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Logical AND.
    #[default]
    #[serde(alias = "and", alias = "AND")]
    All,
    /// Logical OR.
    #[serde(alias = "or", alias = "OR")]
    Any,
}

/// `metric <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: String,
    pub operator: Operator,
    #[serde(default, deserialize_with = "lenient::number")]
    pub value: f64,
}

impl Condition {
    #[must_use]
    pub fn new(metric: impl Into<String>, operator: Operator, value: f64) -> Self {
        Self {
            metric: metric.into(),
            operator,
            value,
        }
    }

    /// Test this comparison; a metric the source does not know reads as `0`.
    #[must_use]
    pub fn holds(&self, source: &impl MetricSource) -> bool {
        let actual = source.metric(&self.metric).unwrap_or(0.0);
        self.operator.compare(actual, self.value)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.metric, self.operator, self.value)
    }
}

/// Evaluate a condition set. An empty set always matches.
#[must_use]
pub fn evaluate(source: &impl MetricSource, conditions: &[Condition], mode: MatchMode) -> bool {
    if conditions.is_empty() {
        return true;
    }
    match mode {
        MatchMode::All => conditions.iter().all(|c| c.holds(source)),
        MatchMode::Any => conditions.iter().any(|c| c.holds(source)),
    }
}
