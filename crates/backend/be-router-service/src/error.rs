use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Router {0} not found")]
    NotFound(Uuid),

    #[error("Router {0} is not active")]
    Inactive(Uuid),

    #[error("Router registry error: {0}")]
    Registry(#[source] be_remote_db::DbError),
}

impl From<be_remote_db::DbError> for RouterError {
    fn from(err: be_remote_db::DbError) -> Self {
        RouterError::Registry(err)
    }
}

pub type RouterResult<T> = Result<T, RouterError>;
