//! Budget arithmetic for `increase_budget` / `decrease_budget`.
//!
//! All amounts are whole currency units; conversion from and to platform
//! units happens in the caller via [`CurrencyPolicy`](crate::currency::CurrencyPolicy).

use crate::rule::{Action, AdjustmentMode, BudgetAdjustment, BudgetDirection};

/// Floor and optional cap applied after an adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetLimits {
    pub floor: f64,
    pub cap: Option<f64>,
}

/// New budget after applying `adjustment` in `direction` to `current`.
///
/// The result is rounded to a whole unit, raised to `limits.floor`, then
/// lowered to `limits.cap` when one is set.
#[must_use]
pub fn compute_new_budget(
    current: f64,
    direction: BudgetDirection,
    adjustment: &BudgetAdjustment,
    limits: BudgetLimits,
) -> f64 {
    let sign = match direction {
        BudgetDirection::Increase => 1.0,
        BudgetDirection::Decrease => -1.0,
    };
    let raw = match adjustment.mode {
        AdjustmentMode::Percentage => current * (1.0 + sign * adjustment.value / 100.0),
        AdjustmentMode::Absolute => current + sign * adjustment.value,
    };
    let floored = raw.round().max(limits.floor);
    match limits.cap {
        Some(cap) => floored.min(cap),
        None => floored,
    }
}

/// Reason to refuse an `increase_budget` on an object whose ROAS is below
/// `min_roas`. Other actions are never refused.
#[must_use]
pub fn roas_guard(action: &Action, roas: f64, min_roas: Option<f64>) -> Option<String> {
    let min = min_roas?;
    match action {
        Action::IncreaseBudget(_) if roas < min => Some(format!(
            "roas {roas} is below the {min} required to increase budget"
        )),
        _ => None,
    }
}
