use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;
use yojana_core::YojanaError;

const TRY_AGAIN: &str =
    "The assistant is temporarily unavailable, please try again in a moment.";

/// JSON error body: `{"error": <kind>, "message": <text>}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Wrapper turning a [`YojanaError`] into an HTTP response.
pub struct ApiError(pub YojanaError);

impl From<YojanaError> for ApiError {
    fn from(err: YojanaError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            YojanaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            YojanaError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            YojanaError::RetrievalFailure(_) | YojanaError::GenerationUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::SERVICE_UNAVAILABLE => TRY_AGAIN.to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!(error = %self.0, "Request failed");
                "Internal server error".to_string()
            }
            _ => self.0.to_string(),
        };
        (status, Json(ErrorBody::new(self.0.kind(), message))).into_response()
    }
}
