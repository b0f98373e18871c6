//! Shared application state for axum handlers.

use std::sync::Arc;

use crate::backend::RuleBackend;

/// Application state shared across all axum handlers.
///
/// `Clone` is implemented manually so `B` itself does not need to be
/// `Clone`; only the `Arc` is cloned.
pub struct AppState<B> {
    pub backend: Arc<B>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: RuleBackend> AppState<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<B>) -> Self {
        Self { backend }
    }
}
