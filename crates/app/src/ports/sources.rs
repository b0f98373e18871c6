//! Read-only data sources consulted during a cycle: ad accounts, labels,
//! performance metrics and sales records.

use std::future::Future;

use adpilot_domain::account::AdAccount;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::id::{LabelId, UserId};
use adpilot_domain::label::LabelAssignment;
use adpilot_domain::metrics::{RawPerformanceRecord, SalesRecord};
use adpilot_domain::rule::{DateWindow, Scope};

/// Ad accounts connected by users.
pub trait AdAccountStore {
    /// Active accounts of `user_id`.
    fn active_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<AdAccount>, AdPilotError>> + Send;

    /// Look an account up by its platform identifier.
    fn get_by_id(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<Option<AdAccount>, AdPilotError>> + Send;
}

/// Label membership, always scoped to one user.
pub trait LabelStore {
    /// Objects of `user_id` carrying any of `labels`.
    fn assignments(
        &self,
        user_id: UserId,
        labels: &[LabelId],
    ) -> impl Future<Output = Result<Vec<LabelAssignment>, AdPilotError>> + Send;
}

/// Restrict records to those whose identifier at `level` is in `ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFilter {
    pub level: Scope,
    pub ids: Vec<String>,
}

/// Which raw performance records to load.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsQuery {
    pub user_id: UserId,
    pub ad_account_id: String,
    pub level: Scope,
    pub window: DateWindow,
    pub filter: Option<ObjectFilter>,
}

/// Raw daily performance records ingested from the platform.
pub trait MetricsStore {
    fn fetch(
        &self,
        query: &MetricsQuery,
    ) -> impl Future<Output = Result<Vec<RawPerformanceRecord>, AdPilotError>> + Send;
}

/// Conversion and revenue records from the CRM.
pub trait SalesStore {
    /// Every record attributed to `object_id` at `level`; date filtering is
    /// left to the caller.
    fn find_by_object(
        &self,
        object_id: &str,
        level: Scope,
    ) -> impl Future<Output = Result<Vec<SalesRecord>, AdPilotError>> + Send;
}
