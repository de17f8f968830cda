use axum::extract::FromRequest;

use crate::error::AuthError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AuthError))]
pub struct JsonBody<T>(pub T);
