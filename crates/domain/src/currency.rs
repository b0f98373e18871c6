//! Currency policy: minor-unit scaling of platform amounts.
//!
//! The ad platform reports spend and budgets in minor units (cents) for every
//! currency except the local one, which has no minor unit. Amounts are brought
//! to whole currency units with [`CurrencyPolicy::to_major`] exactly once per
//! raw value.

use serde::{Deserialize, Serialize};

/// Knows which currency is exempt from minor-unit scaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPolicy {
    local_currency: String,
}

impl Default for CurrencyPolicy {
    fn default() -> Self {
        Self::new("VND")
    }
}

impl CurrencyPolicy {
    /// Number of minor units in one major unit for currencies other than the local one.
    pub const MINOR_UNITS: f64 = 100.0;

    #[must_use]
    pub fn new(local_currency: impl Into<String>) -> Self {
        Self {
            local_currency: local_currency.into().to_ascii_uppercase(),
        }
    }

    #[must_use]
    pub fn local_currency(&self) -> &str {
        &self.local_currency
    }

    /// `true` when amounts in `currency` are reported without minor units.
    ///
    /// An absent currency code is treated as local.
    #[must_use]
    pub fn is_exempt(&self, currency: Option<&str>) -> bool {
        currency.is_none_or(|code| code.eq_ignore_ascii_case(&self.local_currency))
    }

    /// Divisor turning a platform amount into whole currency units.
    #[must_use]
    pub fn factor(&self, currency: Option<&str>) -> f64 {
        if self.is_exempt(currency) {
            1.0
        } else {
            Self::MINOR_UNITS
        }
    }

    /// Platform (minor-unit) amount to whole currency units.
    #[must_use]
    pub fn to_major(&self, amount: f64, currency: Option<&str>) -> f64 {
        amount / self.factor(currency)
    }

    /// Whole currency units back to the platform's representation.
    #[must_use]
    pub fn to_platform(&self, amount: f64, currency: Option<&str>) -> f64 {
        amount * self.factor(currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_leave_local_currency_unscaled() {
        let policy = CurrencyPolicy::new("VND");
        assert!((policy.to_major(500_000.0, Some("VND")) - 500_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_divide_other_currencies_by_one_hundred() {
        let policy = CurrencyPolicy::new("VND");
        assert!((policy.to_major(1_234.0, Some("USD")) - 12.34).abs() < 1e-9);
    }

    #[test]
    fn should_treat_missing_currency_as_local() {
        let policy = CurrencyPolicy::new("VND");
        assert!(policy.is_exempt(None));
    }

    #[test]
    fn should_compare_currency_codes_case_insensitively() {
        let policy = CurrencyPolicy::new("vnd");
        assert!(policy.is_exempt(Some("VND")));
        assert!(!policy.is_exempt(Some("usd")));
    }

    #[test]
    fn should_convert_major_units_back_to_platform_units() {
        let policy = CurrencyPolicy::default();
        assert!((policy.to_platform(12.0, Some("USD")) - 1_200.0).abs() < f64::EPSILON);
    }
}
