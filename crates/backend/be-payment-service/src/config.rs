use url::Url;

use crate::error::PaymentError;

const SANDBOX_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_URL: &str = "https://api.safaricom.co.ke";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesaEnvironment {
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            MpesaEnvironment::Sandbox => SANDBOX_URL,
            MpesaEnvironment::Production => PRODUCTION_URL,
        }
    }
}

impl std::str::FromStr for MpesaEnvironment {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(MpesaEnvironment::Sandbox),
            "production" => Ok(MpesaEnvironment::Production),
            other => Err(PaymentError::Config(format!(
                "MPESA_ENVIRONMENT must be 'sandbox' or 'production', got '{other}'"
            ))),
        }
    }
}

/// Which [`crate::gateway::PaymentGateway`] the service is wired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Mpesa,
    Fake,
}

impl GatewayKind {
    pub fn from_env() -> Result<Self, PaymentError> {
        match std::env::var("PAYMENT_GATEWAY") {
            Ok(raw) => raw.parse(),
            Err(_) => Ok(GatewayKind::Mpesa),
        }
    }
}

impl std::str::FromStr for GatewayKind {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mpesa" => Ok(GatewayKind::Mpesa),
            "fake" => Ok(GatewayKind::Fake),
            other => Err(PaymentError::Config(format!(
                "PAYMENT_GATEWAY must be 'mpesa' or 'fake', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub business_short_code: String,
    pub passkey: String,
    pub callback_url: String,
    pub environment: MpesaEnvironment,
    pub base_url: Url,
}

fn required(name: &'static str) -> Result<String, PaymentError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| PaymentError::Config(format!("{name} environment variable must be set")))
}

impl MpesaConfig {
    pub fn from_env() -> Result<Self, PaymentError> {
        let consumer_key = required("MPESA_CONSUMER_KEY")?;
        let consumer_secret = required("MPESA_CONSUMER_SECRET")?;
        let business_short_code = required("MPESA_BUSINESS_SHORT_CODE")?;
        let passkey = required("MPESA_PASSKEY")?;
        let callback_url = required("MPESA_CALLBACK_URL")?;

        Url::parse(&callback_url).map_err(|e| {
            PaymentError::Config(format!(
                "MPESA_CALLBACK_URL '{callback_url}' is not a valid URL: {e}"
            ))
        })?;

        let environment = match std::env::var("MPESA_ENVIRONMENT") {
            Ok(raw) => raw.parse()?,
            Err(_) => MpesaEnvironment::Sandbox,
        };

        let base_url = Url::parse(environment.base_url())
            .map_err(|e| PaymentError::Config(format!("invalid M-Pesa base URL: {e}")))?;

        Ok(Self {
            consumer_key,
            consumer_secret,
            business_short_code,
            passkey,
            callback_url,
            environment,
            base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gateway_kind() {
        assert_eq!("mpesa".parse::<GatewayKind>().unwrap(), GatewayKind::Mpesa);
        assert_eq!(" FAKE ".parse::<GatewayKind>().unwrap(), GatewayKind::Fake);
        assert!("stripe".parse::<GatewayKind>().is_err());
    }

    #[test]
    fn environment_selects_base_url() {
        let prod: MpesaEnvironment = "production".parse().unwrap();
        assert_eq!(prod.base_url(), "https://api.safaricom.co.ke");
        assert_eq!(
            MpesaEnvironment::Sandbox.base_url(),
            "https://sandbox.safaricom.co.ke"
        );
    }
}
