//! Ad platform port: status and budget reads/writes on campaigns, ad groups
//! and ads.
//!
//! Every call is authenticated with the access token of the ad account that
//! owns the object. Non-success responses surface as
//! [`ExternalApiError`](adpilot_domain::error::ExternalApiError) carrying the
//! raw platform payload.

use std::future::Future;

use adpilot_domain::account::{Budget, RemoteStatus, TargetStatus};
use adpilot_domain::error::AdPilotError;

pub trait AdPlatform {
    fn get_status(
        &self,
        credential: &str,
        object_id: &str,
    ) -> impl Future<Output = Result<RemoteStatus, AdPilotError>> + Send;

    /// Returns the platform response body.
    fn set_status(
        &self,
        credential: &str,
        object_id: &str,
        status: TargetStatus,
    ) -> impl Future<Output = Result<serde_json::Value, AdPilotError>> + Send;

    /// The object's own budget; `None` when it has neither a daily nor a
    /// lifetime budget (e.g. budget managed by the parent campaign).
    fn get_budget(
        &self,
        credential: &str,
        object_id: &str,
    ) -> impl Future<Output = Result<Option<Budget>, AdPilotError>> + Send;

    /// Write `budget.amount` (platform units) to the budget of `budget.kind`.
    fn set_budget(
        &self,
        credential: &str,
        object_id: &str,
        budget: Budget,
    ) -> impl Future<Output = Result<serde_json::Value, AdPilotError>> + Send;
}
