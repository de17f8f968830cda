use axum::extract::FromRequest;

use crate::error::PaymentError;

/// JSON request body that rejects with a 400 `{message}` instead of axum's
/// plain-text 422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(PaymentError))]
pub struct JsonBody<T>(pub T);
