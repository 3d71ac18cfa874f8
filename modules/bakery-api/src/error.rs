use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use bakery_common::BakeryError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// An error response: status plus a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<BakeryError> for ApiError {
    fn from(e: BakeryError) -> Self {
        let status = match &e {
            BakeryError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BakeryError::ConcurrentModification(_) => StatusCode::CONFLICT,
            BakeryError::Forbidden { .. } => StatusCode::FORBIDDEN,
            BakeryError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            BakeryError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BakeryError::Validation(_) => StatusCode::BAD_REQUEST,
            BakeryError::UnknownEventType(_) | BakeryError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        } else if self.status == StatusCode::CONFLICT {
            warn!(error = %self.message, "Request lost a write race");
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
