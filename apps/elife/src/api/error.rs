use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use elife_core::{CoreError, Permission};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Handler error, rendered as `{ "error": "<message>" }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Authentication required")]
    Unauthorized,

    #[error("You do not have permission to {0}")]
    Forbidden(Permission),

    #[error("Too many login attempts. Please try again later.")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(core) => match core {
                CoreError::NotFound { .. } | CoreError::NotRegistered => StatusCode::NOT_FOUND,
                CoreError::Validation(_) | CoreError::Upload(_) => StatusCode::BAD_REQUEST,
                CoreError::Conflict(_) | CoreError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }
                CoreError::NotEligible(_) | CoreError::DualApplicationBlocked { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                CoreError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
                CoreError::Storage(_) | CoreError::Encoding(_) | CoreError::Io(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
