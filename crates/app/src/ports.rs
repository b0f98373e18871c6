//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod action_history;
pub mod ad_platform;
pub mod execution_log_store;
pub mod pending_revert_store;
pub mod rule_repo;
pub mod sources;

pub use action_history::ActionHistoryStore;
pub use ad_platform::AdPlatform;
pub use execution_log_store::ExecutionLogStore;
pub use pending_revert_store::PendingRevertStore;
pub use rule_repo::{RuleRef, RuleRepository};
pub use sources::{AdAccountStore, LabelStore, MetricsQuery, MetricsStore, ObjectFilter, SalesStore};
