use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_auth_service::AuthError;
use be_payment_service::gateway::GatewayError;
use be_remote_db::DbError;
use be_router_service::RouterError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl AdminError {
    /// Maps a store miss to a 404 for `entity`, keeping other failures.
    pub fn from_lookup(entity: &'static str) -> impl FnOnce(DbError) -> AdminError {
        move |err| {
            if err.is_not_found() {
                AdminError::NotFound(entity)
            } else {
                AdminError::Database(err)
            }
        }
    }
}

impl From<JsonRejection> for AdminError {
    fn from(rejection: JsonRejection) -> Self {
        AdminError::Validation(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        if let AdminError::Auth(err) = self {
            return err.into_response();
        }

        let (status, message) = match &self {
            AdminError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AdminError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AdminError::Gateway(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AdminError::Router(RouterError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Router not found".to_string())
            }
            AdminError::Router(RouterError::Inactive(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AdminError::Database(DbError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            AdminError::Database(DbError::Duplicate { .. }) => {
                (StatusCode::CONFLICT, "Record already exists".to_string())
            }
            AdminError::Database(DbError::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AdminError::Auth(_) | AdminError::Router(_) | AdminError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %self, "Admin service error");
        }

        (status, axum::Json(ErrorBody { message })).into_response()
    }
}
