//! Push-payment gateway seam.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod callback;
pub mod fake;
pub mod mpesa;
pub mod phone;

pub use callback::{
    CallbackEnvelope, CallbackError, CallbackOutcome, PaymentReceipt, StkCallback,
    decode_envelope, parse_callback,
};
pub use fake::FakeGateway;
pub use mpesa::MpesaClient;
pub use phone::{PhoneError, normalize_phone, validate_phone};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("M-Pesa authentication failed: {0}")]
    Authentication(String),

    #[error("M-Pesa request failed: {0}")]
    Upstream(String),

    #[error("Unexpected M-Pesa response: {0}")]
    Decode(String),

    #[error("M-Pesa transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Accepted STK push, as acknowledged by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(default)]
    pub response_code: String,
    #[serde(default)]
    pub response_description: String,
    #[serde(default)]
    pub customer_message: String,
}

/// Result of an STK push status query. Passed through to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkQueryResponse {
    #[serde(default)]
    pub response_code: String,
    #[serde(default)]
    pub response_description: String,
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: String,
    #[serde(default)]
    pub result_code: Option<serde_json::Value>,
    #[serde(default)]
    pub result_desc: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Sends a payment prompt to `phone` (already normalized).
    async fn initiate(
        &self,
        phone: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<StkPushResponse, GatewayError>;

    async fn query_status(&self, checkout_request_id: &str)
    -> Result<StkQueryResponse, GatewayError>;
}
