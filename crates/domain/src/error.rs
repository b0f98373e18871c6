//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`AdPilotError`]
//! via `From` at the port boundary.

/// Top-level error carried across port boundaries.
#[derive(Debug, thiserror::Error)]
pub enum AdPilotError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),

    #[error("external api error")]
    ExternalApi(#[from] ExternalApiError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AdPilotError {
    /// Human-readable message including the innermost typed cause.
    ///
    /// Used wherever the message ends up in a persisted log entry or an API
    /// response, where the `#[error]` prefix alone would be too vague.
    #[must_use]
    pub fn detailed_message(&self) -> String {
        match self {
            Self::Validation(err) => format!("validation error: {err}"),
            Self::NotFound(err) => err.to_string(),
            Self::Configuration(err) => format!("configuration error: {err}"),
            Self::ExternalApi(err) => format!("external api error: {err}"),
            Self::Storage(err) => format!("storage error: {err}"),
        }
    }
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("rule must define at least one action or step")]
    NoActions,

    #[error("more than one step uses order {order}")]
    DuplicateStepOrder { order: u32 },

    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error("invalid time range {0:?}")]
    InvalidTimeRange(String),

    #[error("invalid scope {0:?}")]
    InvalidScope(String),

    #[error("budget adjustment value must be a finite, non-negative number")]
    InvalidBudgetValue,

    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),
}

/// A looked-up resource does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The environment a cycle runs in is not usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no active ad account for user {user_id}")]
    NoActiveAdAccount { user_id: String },

    #[error("no credential for ad account {account_id}")]
    MissingCredential { account_id: String },

    #[error("malformed rule field {field}: {reason}")]
    MalformedRuleField { field: &'static str, reason: String },
}

/// A call to the external ad platform did not succeed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExternalApiError {
    /// The platform answered with a non-success status; `payload` is the raw body.
    #[error("platform rejected the request with status {status}: {payload}")]
    Rejected {
        status: u16,
        payload: serde_json::Value,
    },

    #[error("platform call timed out after {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("transport failure: {0}")]
    Transport(String),
}

impl ExternalApiError {
    /// Raw payload to attach to an execution report.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Rejected { payload, .. } => payload.clone(),
            Self::Timeout { after_secs } => serde_json::json!({ "timeout_secs": after_secs }),
            Self::Transport(message) => serde_json::json!({ "transport": message }),
        }
    }
}
