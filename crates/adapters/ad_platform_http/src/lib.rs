//! # adpilot-adapter-ad-platform-http
//!
//! Implements the [`AdPlatform`](adpilot_app::ports::AdPlatform) port against
//! a Graph-style REST API: objects are addressed as `/{version}/{object_id}`,
//! read with `GET ?fields=…` and updated with form-encoded `POST`s.
//!
//! Every request carries the owning account's access token and is bounded by
//! the configured timeout.

pub mod client;
pub mod error;

pub use client::{Config, GraphClient};
pub use error::PlatformError;
