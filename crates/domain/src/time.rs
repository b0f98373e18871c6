//! Time and timestamp helpers.
//!
//! Everything persisted is UTC. Wall-clock arithmetic (daily reset boundaries,
//! fixed-time reverts, reporting dates) happens in an IANA timezone and is
//! converted back with [`localize`].

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ValidationError;

/// UTC timestamp used for run times, log entries, revert due-instants, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parse an IANA timezone name such as `"Asia/Ho_Chi_Minh"`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTimezone`] for unknown names.
pub fn parse_timezone(name: &str) -> Result<Tz, ValidationError> {
    Tz::from_str(name).map_err(|_| ValidationError::InvalidTimezone(name.to_string()))
}

/// Calendar date of `at` as seen in `tz`.
#[must_use]
pub fn local_date(at: Timestamp, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// Map a wall-clock time in `tz` to an absolute instant.
///
/// Ambiguous times (clocks going back) resolve to the earlier instant. Times
/// inside a gap (clocks going forward) move forward to the first valid
/// wall-clock time, an hour later at most twice.
#[must_use]
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    let mut candidate = naive;
    for _ in 0..3 {
        if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
            return Some(resolved);
        }
        candidate += Duration::hours(1);
    }
    None
}

/// UTC instant of local midnight on the day containing `at`.
#[must_use]
pub fn start_of_local_day(at: Timestamp, tz: Tz) -> Timestamp {
    let midnight = local_date(at, tz).and_time(NaiveTime::MIN);
    localize(tz, midnight).map_or(at, |local| local.with_timezone(&Utc))
}
