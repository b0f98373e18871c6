//! Rule repository port: rule definitions plus the run bookkeeping the
//! engine stamps on them.

use std::future::Future;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution_log::LogStatus;
use adpilot_domain::id::{RuleId, UserId};
use adpilot_domain::rule::Rule;
use adpilot_domain::time::Timestamp;

/// Identity of a stored rule, readable even when its definition is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleRef {
    pub id: RuleId,
    pub user_id: UserId,
}

/// Repository for persisting and querying [`Rule`]s.
pub trait RuleRepository {
    /// Create a new rule in storage.
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send;

    /// Get a rule by its unique identifier.
    ///
    /// A stored rule whose definition cannot be decoded yields
    /// [`AdPilotError::Configuration`] rather than a storage error.
    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AdPilotError>> + Send;

    /// Owner of a stored rule, without decoding its definition.
    fn owner_of(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<UserId>, AdPilotError>> + Send;

    /// Rules the periodic scheduler should run: active with auto-schedule on.
    ///
    /// Only identities are listed so that one unreadable rule cannot hide
    /// the others; each is loaded again by its own cycle.
    fn get_schedulable(&self) -> impl Future<Output = Result<Vec<RuleRef>, AdPilotError>> + Send;

    /// Set the processing lock unless another cycle holds a fresh one.
    ///
    /// A lock taken before `stale_before` is considered abandoned and is
    /// reclaimed. Returns `false` when the lock is held by someone else.
    fn try_acquire_lock(
        &self,
        id: RuleId,
        now: Timestamp,
        stale_before: Timestamp,
    ) -> impl Future<Output = Result<bool, AdPilotError>> + Send;

    /// Clear the processing lock.
    fn release_lock(&self, id: RuleId) -> impl Future<Output = Result<(), AdPilotError>> + Send;

    /// Stamp the outcome of the latest cycle.
    fn update_last_run(
        &self,
        id: RuleId,
        status: LogStatus,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send;
}
