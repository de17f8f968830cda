use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

pub use auth_core::{Claims, Role};

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const MIN_SECRET_LEN: usize = 32;
const DEFAULT_EXPIRY_HOURS: i64 = 8;

#[derive(Debug, thiserror::Error)]
pub enum JwtConfigError {
    #[error("ADMIN_JWT_SECRET must be set")]
    MissingSecret,

    #[error("ADMIN_JWT_SECRET must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,

    #[error("ADMIN_TOKEN_EXPIRY_HOURS must be a positive integer, got {0:?}")]
    InvalidExpiry(String),
}

/// Signing material for admin dashboard tokens.
#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_encoding_key: EncodingKey,
    pub access_token_decoding_key: DecodingKey,

    pub access_token_expiry_hours: i64,

    pub validation: Validation,
}

impl JwtConfig {
    pub fn new(secret: &[u8], access_token_expiry_hours: i64) -> Result<Self, JwtConfigError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(JwtConfigError::WeakSecret);
        }
        if access_token_expiry_hours <= 0 {
            return Err(JwtConfigError::InvalidExpiry(
                access_token_expiry_hours.to_string(),
            ));
        }

        Ok(Self {
            access_token_encoding_key: EncodingKey::from_secret(secret),
            access_token_decoding_key: DecodingKey::from_secret(secret),
            access_token_expiry_hours,
            validation: Validation::new(Algorithm::HS256),
        })
    }

    pub fn from_env() -> Result<Self, JwtConfigError> {
        let secret =
            std::env::var("ADMIN_JWT_SECRET").map_err(|_| JwtConfigError::MissingSecret)?;

        let expiry_hours = match std::env::var("ADMIN_TOKEN_EXPIRY_HOURS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| JwtConfigError::InvalidExpiry(raw.clone()))?,
            Err(_) => DEFAULT_EXPIRY_HOURS,
        };

        Self::new(secret.as_bytes(), expiry_hours)
    }

    /// Lifetime of an issued access token in seconds.
    pub fn access_token_ttl_secs(&self) -> i64 {
        Duration::hours(self.access_token_expiry_hours).num_seconds()
    }

    pub fn issue_access_token(
        &self,
        sub: &str,
        username: &str,
        email: &str,
        role: Role,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            exp: (now + Duration::hours(self.access_token_expiry_hours)).timestamp(),
            iat: now.timestamp(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            role,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.access_token_encoding_key,
        )
        .map_err(|e| anyhow!("Failed to sign token: {}", e))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.access_token_decoding_key, &self.validation)
            .map_err(|e| anyhow!("Invalid token: {}", e))?;

        if token_data.claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(anyhow!("Invalid token type: expected access token"));
        }

        Ok(token_data.claims)
    }
}
