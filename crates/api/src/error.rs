//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contracts::ContractError;
use orchestrator::SchedulerError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error returned by handlers, rendered as `{"detail": ...}`
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] SchedulerError);

impl From<ContractError> for ApiError {
    fn from(e: ContractError) -> Self {
        Self(SchedulerError::Contract(e))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SchedulerError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            SchedulerError::Contract(e) => match e {
                ContractError::AssetNotFound { .. } | ContractError::JobNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                ContractError::MissingRequiredInput { .. }
                | ContractError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                ContractError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}
