//! Errors raised by the HTTP client before they cross the port boundary.

use adpilot_domain::error::{AdPilotError, ExternalApiError};

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("status {status}")]
    Rejected {
        status: u16,
        payload: serde_json::Value,
    },

    #[error("timed out after {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("transport: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<PlatformError> for ExternalApiError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Rejected { status, payload } => Self::Rejected { status, payload },
            PlatformError::Timeout { after_secs } => Self::Timeout { after_secs },
            PlatformError::Transport(inner) => Self::Transport(inner.to_string()),
            PlatformError::Decode(message) => Self::Transport(message),
        }
    }
}

impl From<PlatformError> for AdPilotError {
    fn from(err: PlatformError) -> Self {
        AdPilotError::ExternalApi(err.into())
    }
}
