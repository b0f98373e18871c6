//! Time-range selector and the inclusive date window it resolves to.

use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Which reporting days a rule looks at.
///
/// Serialized as `today`, `yesterday`, `this_month`, `last_<N>d` or
/// `custom_<N>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeRange {
    #[default]
    Today,
    Yesterday,
    /// The `N` full days ending yesterday.
    LastDays(u32),
    /// First day of the current month up to today.
    ThisMonth,
    /// The `N` days ending today.
    Custom(u32),
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateWindow {
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.since <= date && date <= self.until
    }
}

impl TimeRange {
    /// Resolve against the current local date.
    ///
    /// A span reaching past the earliest representable date starts there.
    #[must_use]
    pub fn window(self, today: NaiveDate) -> DateWindow {
        let days_before = |n: u32| {
            today
                .checked_sub_days(Days::new(u64::from(n)))
                .unwrap_or(NaiveDate::MIN)
        };
        match self {
            Self::Today => DateWindow {
                since: today,
                until: today,
            },
            Self::Yesterday => {
                let yesterday = days_before(1);
                DateWindow {
                    since: yesterday,
                    until: yesterday,
                }
            }
            Self::LastDays(n) => DateWindow {
                since: days_before(n),
                until: days_before(1),
            },
            Self::ThisMonth => DateWindow {
                since: today.with_day(1).unwrap_or(today),
                until: today,
            },
            Self::Custom(n) => DateWindow {
                since: days_before(n.saturating_sub(1)),
                until: today,
            },
        }
    }
}

impl FromStr for TimeRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let invalid = || ValidationError::InvalidTimeRange(s.to_string());
        let positive = |digits: &str| {
            digits
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(invalid)
        };

        match raw.as_str() {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "this_month" => Ok(Self::ThisMonth),
            other => {
                if let Some(rest) = other.strip_prefix("last_") {
                    let digits = rest
                        .strip_suffix("_days")
                        .or_else(|| rest.strip_suffix('d'))
                        .ok_or_else(invalid)?;
                    positive(digits).map(Self::LastDays)
                } else if let Some(digits) = other.strip_prefix("custom_") {
                    positive(digits).map(Self::Custom)
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

impl TryFrom<String> for TimeRange {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeRange> for String {
    fn from(value: TimeRange) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Today => f.write_str("today"),
            Self::Yesterday => f.write_str("yesterday"),
            Self::LastDays(n) => write!(f, "last_{n}d"),
            Self::ThisMonth => f.write_str("this_month"),
            Self::Custom(n) => write!(f, "custom_{n}"),
        }
    }
}
