use axum::extract::FromRequest;

use crate::error::AdminError;

/// JSON request body whose deserialization failures surface as
/// [`AdminError::Validation`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AdminError))]
pub struct JsonBody<T>(pub T);
