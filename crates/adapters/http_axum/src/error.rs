//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use adpilot_domain::error::AdPilotError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`AdPilotError`] to an HTTP response with appropriate status code.
pub enum ApiError {
    /// A path segment is not a well-formed identifier.
    InvalidId(String),
    Domain(AdPilotError),
}

impl From<AdPilotError> for ApiError {
    fn from(err: AdPilotError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidId(raw) => (StatusCode::BAD_REQUEST, format!("invalid id {raw:?}")),
            Self::Domain(err) => {
                let status = match &err {
                    AdPilotError::Validation(_) => StatusCode::BAD_REQUEST,
                    AdPilotError::NotFound(_) => StatusCode::NOT_FOUND,
                    AdPilotError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    AdPilotError::ExternalApi(_) => StatusCode::BAD_GATEWAY,
                    AdPilotError::Storage(inner) => {
                        tracing::error!(error = %inner, "storage error");
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(ErrorBody {
                                error: "internal server error".to_string(),
                            }),
                        )
                            .into_response();
                    }
                };
                (status, err.detailed_message())
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
