//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod rules;

use axum::Router;
use axum::routing::{get, post};

use crate::backend::RuleBackend;
use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<B: RuleBackend>() -> Router<AppState<B>> {
    Router::new()
        .route("/rules/{id}/run", post(rules::run::<B>))
        .route("/rules/{id}/logs", get(rules::logs::<B>))
}
