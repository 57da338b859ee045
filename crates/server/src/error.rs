//! # API Errors
//!
//! Maps refused control operations and bad input onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use verdict_core::ControlError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// JSON body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Control(ControlError::RunAlreadyActive) => {
                (StatusCode::CONFLICT, "RunAlreadyActive")
            }
            ApiError::Control(ControlError::InvalidApprovalState) => {
                (StatusCode::CONFLICT, "InvalidApprovalState")
            }
            ApiError::Control(ControlError::DecisionRecorded) => {
                (StatusCode::CONFLICT, "DecisionRecorded")
            }
            ApiError::Control(ControlError::NoActiveRun) => (StatusCode::NOT_FOUND, "NoActiveRun"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            ApiError::Internal(err) => {
                tracing::error!(error = %format!("{:#}", err), "Request failed");
                format!("{:#}", err)
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: kind.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
