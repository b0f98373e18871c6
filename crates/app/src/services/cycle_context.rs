//! Cycle-scoped view of the user's ad accounts.
//!
//! Built once at the start of a rule-evaluation cycle and passed explicitly
//! to aggregation, enrichment and execution. Nothing is cached across cycles.

use std::collections::HashMap;

use adpilot_domain::account::AdAccount;
use adpilot_domain::error::ConfigurationError;
use adpilot_domain::time::parse_timezone;
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct CycleContext {
    accounts: Vec<AdAccount>,
    currencies: HashMap<String, String>,
    default_timezone: Tz,
}

impl CycleContext {
    #[must_use]
    pub fn new(accounts: Vec<AdAccount>, default_timezone: Tz) -> Self {
        let currencies = accounts
            .iter()
            .filter_map(|a| a.currency.clone().map(|c| (a.id.clone(), c)))
            .collect();
        Self {
            accounts,
            currencies,
            default_timezone,
        }
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AdAccount> {
        self.accounts.iter()
    }

    #[must_use]
    pub fn account(&self, account_id: &str) -> Option<&AdAccount> {
        self.accounts.iter().find(|a| a.id == account_id)
    }

    /// Account id to currency code, for accounts that report one.
    #[must_use]
    pub fn currencies(&self) -> &HashMap<String, String> {
        &self.currencies
    }

    #[must_use]
    pub fn currency_of(&self, account_id: &str) -> Option<&str> {
        self.currencies.get(account_id).map(String::as_str)
    }

    /// Account timezone, or the engine default when unset or unknown.
    #[must_use]
    pub fn timezone_of(&self, account_id: &str) -> Tz {
        self.account(account_id)
            .and_then(|a| a.timezone.as_deref())
            .and_then(|name| parse_timezone(name).ok())
            .unwrap_or(self.default_timezone)
    }

    #[must_use]
    pub fn default_timezone(&self) -> Tz {
        self.default_timezone
    }

    /// Access token for the account owning an object.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingCredential`] when the account is
    /// not part of this cycle or has no usable token.
    pub fn credential_of(&self, account_id: &str) -> Result<&str, ConfigurationError> {
        self.account(account_id)
            .and_then(AdAccount::credential)
            .ok_or_else(|| ConfigurationError::MissingCredential {
                account_id: account_id.to_string(),
            })
    }
}
