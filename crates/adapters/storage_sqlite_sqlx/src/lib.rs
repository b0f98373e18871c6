//! # adpilot-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the store port traits defined in `adpilot-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! Rule definitions keep their conditions, actions, steps, labels and
//! settings as JSON columns. A malformed JSON column is logged and read as
//! empty (or default) so one bad field never aborts a cycle.
//!
//! ## Dependency rule
//! Depends on `adpilot-app` (for port traits) and `adpilot-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;
pub mod error;
pub mod pool;

pub mod action_history_repo;
pub mod ad_account_repo;
pub mod execution_log_repo;
pub mod label_repo;
pub mod metrics_repo;
pub mod pending_revert_repo;
pub mod rule_repo;
pub mod sales_repo;

pub use action_history_repo::SqliteActionHistoryStore;
pub use ad_account_repo::SqliteAdAccountStore;
pub use execution_log_repo::SqliteExecutionLogStore;
pub use label_repo::SqliteLabelStore;
pub use metrics_repo::SqliteMetricsStore;
pub use pending_revert_repo::SqlitePendingRevertStore;
pub use rule_repo::SqliteRuleRepository;
pub use sales_repo::SqliteSalesStore;
pub use pool::{Config, Database};
