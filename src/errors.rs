use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::gemini::GeminiError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Required external credential or configuration absent. Raised before
    /// any network attempt.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Local precondition unmet. Rejected synchronously, never reaches the
    /// collaborator.
    #[error("invalid input: {0}")]
    Input(String),

    /// The collaborator call failed or returned a malformed payload.
    #[error("service error: {0}")]
    Service(String),

    /// A field value outside its declared range or vocabulary.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("session not found")]
    SessionNotFound,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Input(_) => StatusCode::BAD_REQUEST,
            AppError::Service(_) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound => StatusCode::NOT_FOUND,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "configuration",
            AppError::Input(_) => "input",
            AppError::Service(_) => "service",
            AppError::Validation(_) => "validation",
            AppError::SessionNotFound => "not_found",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<GeminiError> for AppError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::MissingApiKey => {
                AppError::Configuration("GEMINI_API_KEY is not set".into())
            }
            other => AppError::Service(other.to_string()),
        }
    }
}
