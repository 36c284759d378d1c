use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::{ServiceError, ValidationError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Service(err) => match err {
                ServiceError::InvalidRequest(_)
                | ServiceError::NotConfigured
                | ServiceError::Llm { .. }
                | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound { .. } | ServiceError::Source(_) => StatusCode::NOT_FOUND,
                ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (code, Json(body)).into_response()
    }
}
