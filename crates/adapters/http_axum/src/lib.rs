//! # adpilot-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Expose the trigger surface: `POST /api/rules/{id}/run` starts one
//!   rule-evaluation cycle (manual, scheduled or dry run) and returns its
//!   report.
//! - Expose the execution log: `GET /api/rules/{id}/logs?limit=N`.
//! - Map [`AdPilotError`](adpilot_domain::error::AdPilotError) into HTTP
//!   status codes.
//!
//! ## Dependency rule
//! Depends on `adpilot-app` (for the use-cases) and `adpilot-domain` (for the
//! types used in request/response mapping). Never leaks axum types into the
//! domain.

pub mod api;
pub mod backend;
pub mod error;
pub mod router;
pub mod state;
