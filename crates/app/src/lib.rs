//! # adpilot-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RuleRepository`: rule definitions, processing lock, last-run stamp
//!   - `AdAccountStore`, `LabelStore`, `MetricsStore`, `SalesStore`: cycle inputs
//!   - `ExecutionLogStore`: one entry per cycle
//!   - `ActionHistoryStore`: executions counted by the cooldown guard
//!   - `PendingRevertStore`: scheduled auto-reverts
//!   - `AdPlatform`: status and budget reads/writes on the ad platform
//! - Define **driving/inbound** use-cases:
//!   - `RuleEngine`: one rule-evaluation cycle, and the scheduler tick
//!   - `RevertSweeper`: apply due auto-reverts
//!   - `RuleService`: create and look up rules, read their log
//!
//! ## Dependency rule
//! Depends on `adpilot-domain` only (plus `tokio::time` for call timeouts).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod rule_engine;
pub mod services;

#[cfg(test)]
mod testing;
