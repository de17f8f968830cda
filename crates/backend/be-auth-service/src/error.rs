use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    // 400
    #[error("{0}")]
    InvalidInput(String),

    // 401
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Missing authorization header")]
    MissingAuthHeader,
    #[error("Invalid authorization header format")]
    InvalidAuthHeader,
    #[error("Invalid or expired token")]
    InvalidToken,

    // 403
    #[error("Insufficient permissions")]
    Forbidden,

    // 429
    #[error("Too many failed login attempts, try again later")]
    TooManyAttempts,

    // 500
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
    #[error("Database error: {0}")]
    Database(#[from] be_remote_db::DbError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::InvalidInput(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),

            AuthError::InvalidCredentials
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken => {
                warn!(error = %self, "Admin authentication rejected");
                (StatusCode::UNAUTHORIZED, self.to_string())
            }

            AuthError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AuthError::TooManyAttempts => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),

            AuthError::PasswordHash(_)
            | AuthError::TokenGeneration(_)
            | AuthError::Database(_)
            | AuthError::Internal(_) => {
                error!(error = %self, "Admin auth error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorBody { message })).into_response()
    }
}
