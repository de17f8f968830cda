use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::info;

use super::{GatewayError, PaymentGateway, StkPushResponse, StkQueryResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPush {
    pub phone: String,
    pub amount: Decimal,
    pub reference: String,
    pub checkout_request_id: String,
}

/// Offline gateway that accepts every push with deterministic ids.
///
/// Completion is driven by posting a callback to the webhook route, which
/// makes it suitable for local development and handler tests.
#[derive(Debug, Default)]
pub struct FakeGateway {
    counter: AtomicU64,
    pushes: Mutex<Vec<RecordedPush>>,
    fail_with: Mutex<Option<String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next push fail with `message` as the provider error.
    pub fn fail_next_with(&self, message: impl Into<String>) {
        *self.fail_with.lock() = Some(message.into());
    }

    pub fn pushes(&self) -> Vec<RecordedPush> {
        self.pushes.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initiate(
        &self,
        phone: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<StkPushResponse, GatewayError> {
        if let Some(message) = self.fail_with.lock().take() {
            return Err(GatewayError::Upstream(message));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let checkout_request_id = format!("ws_CO_fake_{n}");
        self.pushes.lock().push(RecordedPush {
            phone: phone.to_string(),
            amount,
            reference: reference.to_string(),
            checkout_request_id: checkout_request_id.clone(),
        });

        info!(%phone, %amount, %reference, %checkout_request_id, "Fake STK push");

        Ok(StkPushResponse {
            merchant_request_id: format!("fake-merchant-{n}"),
            checkout_request_id,
            response_code: "0".into(),
            response_description: "Success. Request accepted for processing".into(),
            customer_message: "Success. Request accepted for processing".into(),
        })
    }

    async fn query_status(
        &self,
        checkout_request_id: &str,
    ) -> Result<StkQueryResponse, GatewayError> {
        Ok(StkQueryResponse {
            response_code: "0".into(),
            response_description: "The service request has been accepted successfully".into(),
            merchant_request_id: String::new(),
            checkout_request_id: checkout_request_id.to_string(),
            result_code: None,
            result_desc: None,
        })
    }
}
