//! JSON REST handlers for rule cycles.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use adpilot_app::rule_engine::{CycleReport, RunRequest};
use adpilot_domain::execution_log::ExecutionLog;
use adpilot_domain::id::{RuleId, UserId};

use crate::backend::RuleBackend;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for starting a cycle.
#[derive(Deserialize)]
pub struct RunRuleRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub manual_run: bool,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub limit: Option<u32>,
}

/// Possible responses from the run endpoint.
pub enum RunResponse {
    Ok(Json<CycleReport>),
}

impl IntoResponse for RunResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the logs endpoint.
pub enum LogsResponse {
    Ok(Json<Vec<ExecutionLog>>),
}

impl IntoResponse for LogsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

fn parse_rule_id(raw: &str) -> Result<RuleId, ApiError> {
    RuleId::from_str(raw).map_err(|_| ApiError::InvalidId(raw.to_string()))
}

/// `POST /api/rules/{id}/run`: run one cycle and return its report.
///
/// Skipped cycles are still a `200`; failed cycles surface their error.
pub async fn run<B: RuleBackend>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
    Json(req): Json<RunRuleRequest>,
) -> Result<RunResponse, ApiError> {
    let request = RunRequest {
        rule_id: parse_rule_id(&id)?,
        user_id: req.user_id,
        manual_run: req.manual_run,
        dry_run: req.dry_run,
    };
    let report = state.backend.run_rule(request).await?;
    Ok(RunResponse::Ok(Json(report)))
}

/// `GET /api/rules/{id}/logs?limit=N`: most recent log entries, newest first.
pub async fn logs<B: RuleBackend>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<LogsResponse, ApiError> {
    let rule_id = parse_rule_id(&id)?;
    let logs = state.backend.rule_logs(rule_id, query.limit).await?;
    Ok(LogsResponse::Ok(Json(logs)))
}
