use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use bazaar_auth::AuthError;
use bazaar_types::api::ErrorBody;

/// HTTP-facing error. Authentication failures collapse into one generic
/// 401 body, so an expired token and a malformed one are
/// indistinguishable to clients.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    BadRequest(String),
    NotFound(String),
    /// Detail is present only when the environment allows exposing it;
    /// the full error is always logged.
    Internal(Option<String>),
}

impl ApiError {
    pub fn from_auth(err: AuthError, expose_errors: bool) -> Self {
        match err {
            AuthError::Unauthorized => ApiError::Unauthorized,
            AuthError::Forbidden => ApiError::Forbidden,
            AuthError::BadRequest(msg) => ApiError::BadRequest(msg),
            AuthError::NotFound(msg) => ApiError::NotFound(msg),
            AuthError::Internal(e) => {
                error!("Internal error: {:#}", e);
                ApiError::Internal(expose_errors.then(|| format!("{:#}", e)))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Could not validate credentials".to_string(),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail.unwrap_or_else(|| "Internal server error".to_string()),
            ),
        };

        (
            status,
            Json(ErrorBody {
                ok: false,
                error: message,
            }),
        )
            .into_response()
    }
}
