use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use be_auth_core::JwtConfig;

use crate::error::AuthError;

/// Authenticated dashboard caller.
///
/// Requires an `Arc<JwtConfig>` request extension and a valid
/// `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AdminSession(pub auth_core::Claims);

impl AdminSession {
    pub fn role(&self) -> auth_core::Role {
        self.0.role
    }

    /// Fails with 403 unless the caller may change dashboard data.
    pub fn require_write(&self) -> Result<(), AuthError> {
        if self.0.role.can_write() {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.0.username,
                role = %self.0.role,
                "Rejected mutation from read-only admin"
            );
            Err(AuthError::Forbidden)
        }
    }
}

impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jwt_config = parts
            .extensions
            .get::<Arc<JwtConfig>>()
            .ok_or_else(|| AuthError::Internal("JwtConfig not found in extensions".into()))?;

        let auth_header = parts
            .headers
            .get("authorization")
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = jwt_config
            .validate_access_token(token)
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AdminSession(claims))
    }
}

/// Best-effort client address: `X-Forwarded-For`, `X-Real-IP`, then the
/// peer address recorded by the server.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());

        let real_ip = || {
            parts
                .headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        };

        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        };

        Ok(ClientIp(
            forwarded
                .or_else(real_ip)
                .or_else(peer)
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        ))
    }
}
