use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_remote_db::DbError;
use serde::Serialize;

use crate::gateway::{CallbackError, GatewayError, PhoneError};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Phone(#[from] PhoneError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    MalformedCallback(#[from] CallbackError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for PaymentError {
    fn from(rejection: JsonRejection) -> Self {
        PaymentError::Validation(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PaymentError::Validation(_) | PaymentError::Phone(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            PaymentError::Database(err) if err.is_not_found() => {
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            PaymentError::Gateway(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            PaymentError::MalformedCallback(_) => {
                (StatusCode::BAD_REQUEST, "malformed callback".to_string())
            }
            PaymentError::Config(_) | PaymentError::Database(_) | PaymentError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %self, "Payment service error");
        } else {
            tracing::warn!(%status, error = %self, "Payment request rejected");
        }

        (status, axum::Json(ErrorBody { message })).into_response()
    }
}
