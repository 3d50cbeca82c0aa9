use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use iidj_keys::KeyError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("key manager error: {0}")]
    KeyManager(#[from] KeyError),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::KeyManager(_) | ApiError::Signing(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        ApiError::Signing(e.to_string())
    }
}
