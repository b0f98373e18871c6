//! Pending revert port: produced by the action executor, consumed by the
//! revert sweeper.

use std::future::Future;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::id::PendingRevertId;
use adpilot_domain::revert::PendingRevert;
use adpilot_domain::time::Timestamp;

pub trait PendingRevertStore {
    fn create(
        &self,
        revert: PendingRevert,
    ) -> impl Future<Output = Result<PendingRevert, AdPilotError>> + Send;

    /// `pending` rows with `revert_at <= now`, oldest first.
    fn due(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<PendingRevert>, AdPilotError>> + Send;

    fn mark_done(
        &self,
        id: PendingRevertId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send;

    fn mark_failed(
        &self,
        id: PendingRevertId,
        error: &str,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send;
}
