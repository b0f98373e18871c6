//! Graph-style HTTP client.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use adpilot_app::ports::AdPlatform;
use adpilot_domain::account::{Budget, BudgetKind, RemoteStatus, TargetStatus};
use adpilot_domain::error::AdPilotError;

use crate::error::PlatformError;

/// Connection settings for [`GraphClient`].
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com".to_string(),
            api_version: "v19.0".to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: RemoteStatus,
}

#[derive(Debug, Deserialize)]
struct BudgetResponse {
    #[serde(default)]
    daily_budget: Option<Value>,
    #[serde(default)]
    lifetime_budget: Option<Value>,
}

/// Budgets come back as decimal strings; `"0"` means "not set on this object".
fn positive_amount(raw: Option<&Value>) -> Option<f64> {
    let amount = match raw? {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (amount.is_finite() && amount > 0.0).then_some(amount)
}

impl BudgetResponse {
    fn into_budget(self) -> Option<Budget> {
        if let Some(amount) = positive_amount(self.daily_budget.as_ref()) {
            return Some(Budget {
                amount,
                kind: BudgetKind::Daily,
            });
        }
        positive_amount(self.lifetime_budget.as_ref()).map(|amount| Budget {
            amount,
            kind: BudgetKind::Lifetime,
        })
    }
}

fn budget_field(kind: BudgetKind) -> &'static str {
    match kind {
        BudgetKind::Daily => "daily_budget",
        BudgetKind::Lifetime => "lifetime_budget",
    }
}

/// [`AdPlatform`] implementation over HTTP.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    timeout: Duration,
}

impl GraphClient {
    /// # Errors
    ///
    /// Returns [`PlatformError::Transport`] if the underlying client cannot be
    /// built (e.g. TLS backend initialisation failure).
    pub fn new(config: Config) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(PlatformError::Transport)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.trim_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    fn object_url(&self, object_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_version, object_id)
    }

    fn classify(&self, err: reqwest::Error) -> PlatformError {
        if err.is_timeout() {
            PlatformError::Timeout {
                after_secs: self.timeout.as_secs(),
            }
        } else {
            PlatformError::Transport(err)
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, PlatformError> {
        let response = request.send().await.map_err(|err| self.classify(err))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|err| self.classify(err))?;

        if !status.is_success() {
            let payload = serde_json::from_slice(&body)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
            return Err(PlatformError::Rejected {
                status: status.as_u16(),
                payload,
            });
        }

        serde_json::from_slice(&body).map_err(|err| PlatformError::Decode(err.to_string()))
    }

    async fn read(&self, credential: &str, object_id: &str, fields: &str) -> Result<Value, PlatformError> {
        let request = self
            .http
            .get(self.object_url(object_id))
            .query(&[("fields", fields), ("access_token", credential)]);
        self.send(request).await
    }

    async fn update(
        &self,
        credential: &str,
        object_id: &str,
        field: &str,
        value: &str,
    ) -> Result<Value, PlatformError> {
        let request = self
            .http
            .post(self.object_url(object_id))
            .form(&[(field, value), ("access_token", credential)]);
        self.send(request).await
    }
}

impl AdPlatform for GraphClient {
    async fn get_status(&self, credential: &str, object_id: &str) -> Result<RemoteStatus, AdPilotError> {
        tracing::debug!(object_id, "reading status");
        let body = self.read(credential, object_id, "status").await?;
        let parsed: StatusResponse =
            serde_json::from_value(body).map_err(|err| PlatformError::Decode(err.to_string()))?;
        Ok(parsed.status)
    }

    async fn set_status(
        &self,
        credential: &str,
        object_id: &str,
        status: TargetStatus,
    ) -> Result<Value, AdPilotError> {
        tracing::debug!(object_id, status = status.as_str(), "updating status");
        Ok(self
            .update(credential, object_id, "status", status.as_str())
            .await?)
    }

    async fn get_budget(&self, credential: &str, object_id: &str) -> Result<Option<Budget>, AdPilotError> {
        tracing::debug!(object_id, "reading budget");
        let body = self
            .read(credential, object_id, "daily_budget,lifetime_budget")
            .await?;
        let parsed: BudgetResponse =
            serde_json::from_value(body).map_err(|err| PlatformError::Decode(err.to_string()))?;
        Ok(parsed.into_budget())
    }

    async fn set_budget(
        &self,
        credential: &str,
        object_id: &str,
        budget: Budget,
    ) -> Result<Value, AdPilotError> {
        let amount = format!("{:.0}", budget.amount.round());
        tracing::debug!(object_id, amount = %amount, "updating budget");
        Ok(self
            .update(credential, object_id, budget_field(budget.kind), &amount)
            .await?)
    }
}
