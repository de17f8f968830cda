use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use url::Url;

use crate::config::MpesaConfig;

use super::{GatewayError, PaymentGateway, StkPushResponse, StkQueryResponse};

const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
}

impl TokenResponse {
    fn ttl(&self) -> Duration {
        let secs = match &self.expires_in {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        Duration::from_secs(secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushRequest<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: i64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    account_reference: &'a str,
    transaction_desc: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkQueryRequest<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: &'a str,
}

/// Daraja API client for Lipa Na M-Pesa Online (STK push).
///
/// Requests are sent once; failures are returned to the caller as
/// [`GatewayError`] without retrying.
pub struct MpesaClient {
    http: reqwest::Client,
    base_url: Url,
    config: MpesaConfig,
    token: Mutex<Option<CachedToken>>,
}

impl MpesaClient {
    pub fn new(config: MpesaConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let base_url = config.base_url.clone();
        Ok(Self::with_client(http, base_url, config))
    }

    /// Client against an explicit base URL, used to point at a mock server.
    pub fn with_client(http: reqwest::Client, base_url: Url, config: MpesaConfig) -> Self {
        Self {
            http,
            base_url,
            config,
            token: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Decode(format!("invalid endpoint {path}: {e}")))
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        debug!("Requesting M-Pesa access token");
        let credentials = STANDARD.encode(format!(
            "{}:{}",
            self.config.consumer_key, self.config.consumer_secret
        ));
        let response = self
            .http
            .get(self.url("/oauth/v1/generate")?)
            .query(&[("grant_type", "client_credentials")])
            .header("Authorization", format!("Basic {credentials}"))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "M-Pesa token request rejected");
            return Err(GatewayError::Authentication(body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        let refresh_at = Instant::now() + token.ttl().saturating_sub(TOKEN_REFRESH_MARGIN);
        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            refresh_at,
        });

        Ok(value)
    }

    /// Returns `(password, timestamp)` for an STK request.
    fn password(&self) -> (String, String) {
        let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let password = stk_password(
            &self.config.business_short_code,
            &self.config.passkey,
            &timestamp,
        );
        (password, timestamp)
    }
}

pub fn stk_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{short_code}{passkey}{timestamp}"))
}

/// Whole shillings, rounded up.
fn billable_amount(amount: Decimal) -> Result<i64, GatewayError> {
    amount
        .ceil()
        .to_i64()
        .ok_or_else(|| GatewayError::Decode(format!("amount {amount} out of range")))
}

#[async_trait]
impl PaymentGateway for MpesaClient {
    async fn initiate(
        &self,
        phone: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<StkPushResponse, GatewayError> {
        let token = self.access_token().await?;
        let (password, timestamp) = self.password();
        let short_code = self.config.business_short_code.as_str();

        let request = StkPushRequest {
            business_short_code: short_code,
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount: billable_amount(amount)?,
            party_a: phone,
            party_b: short_code,
            phone_number: phone,
            callback_url: &self.config.callback_url,
            account_reference: reference,
            transaction_desc: format!("Payment for {reference}"),
        };

        let response = self
            .http
            .post(self.url("/mpesa/stkpush/v1/processrequest")?)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, %reference, "STK push rejected");
            return Err(GatewayError::Upstream(body));
        }

        let push: StkPushResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if !push.response_code.is_empty() && push.response_code != "0" {
            error!(
                response_code = %push.response_code,
                description = %push.response_description,
                "STK push not accepted"
            );
            return Err(GatewayError::Upstream(push.response_description));
        }

        info!(
            checkout_request_id = %push.checkout_request_id,
            %reference,
            "STK push accepted"
        );
        Ok(push)
    }

    async fn query_status(
        &self,
        checkout_request_id: &str,
    ) -> Result<StkQueryResponse, GatewayError> {
        let token = self.access_token().await?;
        let (password, timestamp) = self.password();

        let request = StkQueryRequest {
            business_short_code: &self.config.business_short_code,
            password,
            timestamp,
            checkout_request_id,
        };

        let response = self
            .http
            .post(self.url("/mpesa/stkpushquery/v1/query")?)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream(body));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}
