//! # adpilot-domain
//!
//! Pure domain model for the adpilot ad-automation rule engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Rules** (root conditions/actions plus ordered dependent steps)
//! - Define **Conditions** and their evaluation against aggregated metrics
//! - Resolve a rule for one object, honouring `keep` overrides and `AND` gating
//! - Aggregate raw daily performance into per-object summaries, currency-normalised
//! - Derive sales ratios (booking rate, ROAS, ...) from CRM records
//! - Budget arithmetic, revert-instant computation and cooldown windows
//! - Execution-log and pending-revert records
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod lenient;
pub mod time;

pub mod account;
pub mod budget;
pub mod cooldown;
pub mod currency;
pub mod execution_log;
pub mod label;
pub mod metrics;
pub mod revert;
pub mod rule;
