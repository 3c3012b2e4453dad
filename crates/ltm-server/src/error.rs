use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ltm_core::ChatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Media not found: {0}")]
    MediaNotFound(String),

    #[error("Media too large: {size} bytes (max {max})")]
    MediaTooLarge { size: usize, max: usize },

    #[error("Media storage error: {0}")]
    MediaStorage(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Chat(err) => match err {
                ChatError::MissingField(_)
                | ChatError::InvalidInput(_)
                | ChatError::BadReference(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                ChatError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                ChatError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
                ChatError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
                ChatError::Store(e) => {
                    tracing::error!(error = %e, "Storage failure");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
            ServerError::MediaNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::MediaTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ServerError::MediaStorage(e) => {
                tracing::error!(error = %e, "Media storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Media storage error".to_string())
            }
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
