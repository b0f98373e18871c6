//! Execution-limit arithmetic: the window prior executions are counted in,
//! and the allow/deny decision for a count.

use chrono::Duration;
use chrono_tz::Tz;
use serde::Serialize;

use crate::rule::AdvancedSettings;
use crate::time::{Timestamp, start_of_local_day};

const DEFAULT_COOLDOWN_HOURS: f64 = 24.0;

/// Earliest execution time that still counts against the limit.
///
/// With `reset_daily` the window opens at local midnight in `tz`; otherwise it
/// is the last `cooldown_hours` hours.
#[must_use]
pub fn window_start(settings: &AdvancedSettings, now: Timestamp, tz: Tz) -> Timestamp {
    if settings.reset_daily {
        return start_of_local_day(now, tz);
    }
    let hours = if settings.cooldown_hours.is_finite() && settings.cooldown_hours > 0.0 {
        settings.cooldown_hours
    } else {
        DEFAULT_COOLDOWN_HOURS
    };
    #[allow(clippy::cast_possible_truncation)]
    let seconds = (hours * 3600.0).round() as i64;
    Duration::try_seconds(seconds)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(Timestamp::MIN_UTC)
}

/// Outcome of a cooldown check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CooldownDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CooldownDecision {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decide from the number of prior executions inside the active window.
#[must_use]
pub fn decide(prior_executions: u32, settings: &AdvancedSettings) -> CooldownDecision {
    if !settings.enable_execution_limit {
        return CooldownDecision::allow();
    }
    let limit = settings.max_executions_per_object;
    if prior_executions < limit {
        return CooldownDecision::allow();
    }
    let window = if settings.reset_daily {
        "since the daily reset".to_string()
    } else {
        format!("in the last {}h", settings.cooldown_hours)
    };
    CooldownDecision::deny(format!(
        "execution limit reached: {prior_executions}/{limit} {window}"
    ))
}
