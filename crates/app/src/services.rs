//! Application services: use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod action_executor;
pub mod cooldown_guard;
pub mod cycle_context;
pub mod revert_scheduler;
pub mod revert_sweeper;
pub mod rule_service;
pub mod sales_enricher;
