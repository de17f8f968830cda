use std::{net::IpAddr, sync::Arc};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{Json, Router, extract::State, routing::post};
use be_auth_core::JwtConfig;
use be_remote_db::{Admin, HotspotStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use extract::JsonBody;

pub use auth_core::{Claims, Role};

pub mod error;
mod extract;
pub mod rate_limit;
pub mod session;

pub use error::AuthError;
pub use rate_limit::{LoginFailureRateLimiter, new_login_failure_rate_limiter};
pub use session::{AdminSession, ClientIp};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub admin: AdminProfile,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Password verified for unknown usernames so both failure paths pay for
/// one argon2 verification.
const DECOY_PASSWORD: &str = "decoy-password-never-issued";

pub struct AdminAuthService {
    store: Arc<dyn HotspotStore>,
    jwt_config: Arc<JwtConfig>,
    failed_logins: LoginFailureRateLimiter,
    decoy_hash: Option<String>,
}

impl AdminAuthService {
    pub fn new(store: Arc<dyn HotspotStore>, jwt_config: Arc<JwtConfig>) -> Self {
        Self::with_rate_limiter(store, jwt_config, new_login_failure_rate_limiter())
    }

    pub fn with_rate_limiter(
        store: Arc<dyn HotspotStore>,
        jwt_config: Arc<JwtConfig>,
        failed_logins: LoginFailureRateLimiter,
    ) -> Self {
        tracing::info!("Creating new AdminAuthService instance");
        let decoy_hash = match hash_password(DECOY_PASSWORD) {
            Ok(hash) => Some(hash),
            Err(err) => {
                tracing::warn!(error = %err, "Could not prepare decoy password hash");
                None
            }
        };
        Self {
            store,
            jwt_config,
            failed_logins,
            decoy_hash,
        }
    }

    pub fn jwt_config(&self) -> Arc<JwtConfig> {
        self.jwt_config.clone()
    }

    pub async fn login(
        &self,
        client_ip: IpAddr,
        request: LoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        let username = request.username.trim();
        let password = request.password;

        if username.is_empty() || password.is_empty() {
            tracing::warn!("Login attempt with empty credentials");
            return Err(AuthError::InvalidInput(
                "Username and password are required".into(),
            ));
        }

        let admin = match self.store.get_admin_by_username(username).await {
            Ok(admin) => Some(admin),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err.into()),
        };

        let Some(admin) = admin else {
            if let Some(decoy) = &self.decoy_hash {
                let _ = verify_password(&password, decoy);
            }
            tracing::warn!(%username, %client_ip, "Login failed: unknown admin");
            return Err(self.record_failure(client_ip));
        };

        if !verify_password(&password, &admin.password_hash)? {
            tracing::warn!(%username, %client_ip, "Login failed: invalid password");
            return Err(self.record_failure(client_ip));
        }

        let role = resolve_role(&admin);
        let token = self
            .jwt_config
            .issue_access_token(&admin.id.to_string(), &admin.username, &admin.email, role)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;

        tracing::info!(username = %admin.username, %role, "Admin logged in");

        Ok(LoginResponse {
            token,
            expires_in: self.jwt_config.access_token_ttl_secs(),
            admin: AdminProfile {
                id: admin.id,
                username: admin.username,
                name: admin.name,
                email: admin.email,
                role,
            },
        })
    }

    fn record_failure(&self, client_ip: IpAddr) -> AuthError {
        if self.failed_logins.check_key(&client_ip).is_err() {
            tracing::warn!(%client_ip, "Failed login budget exhausted");
            return AuthError::TooManyAttempts;
        }
        AuthError::InvalidCredentials
    }
}

fn resolve_role(admin: &Admin) -> Role {
    admin.role.parse().unwrap_or_else(|_| {
        tracing::warn!(
            username = %admin.username,
            role = %admin.role,
            "Unknown admin role, treating as viewer"
        );
        Role::Viewer
    })
}

async fn login(
    State(service): State<Arc<AdminAuthService>>,
    ClientIp(client_ip): ClientIp,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    service.login(client_ip, request).await.map(Json)
}

pub fn create_router(service: Arc<AdminAuthService>) -> Router {
    Router::new()
        .route("/api/admin/login", post(login))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use be_remote_db::{MemoryStore, NewAdmin};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::rate_limit::login_failure_rate_limiter;

    const SECRET: &[u8] = b"test-secret-that-is-at-least-32-bytes!!";

    async fn service_with_admin(burst: u32) -> Arc<AdminAuthService> {
        let store = Arc::new(MemoryStore::new());
        store
            .create_admin(NewAdmin {
                username: "admin".into(),
                password_hash: hash_password("admin123").unwrap(),
                name: "Admin User".into(),
                email: "admin@hotspot.local".into(),
                role: "admin".into(),
            })
            .await
            .unwrap();

        Arc::new(AdminAuthService::with_rate_limiter(
            store,
            Arc::new(JwtConfig::new(SECRET, 8).unwrap()),
            login_failure_rate_limiter(
                NonZeroU32::new(1).unwrap(),
                NonZeroU32::new(burst).unwrap(),
            ),
        ))
    }

    fn login_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/admin/login")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[tokio::test]
    async fn login_issues_token() {
        let service = service_with_admin(5).await;
        let jwt = service.jwt_config();
        let app = create_router(service);

        let response = app
            .oneshot(login_request(
                json!({"username": "admin", "password": "admin123"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["expiresIn"], 8 * 3600);
        assert_eq!(body["admin"]["role"], "admin");
        assert!(body["admin"].get("passwordHash").is_none());

        let claims = jwt
            .validate_access_token(body["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.username, "admin");
    }

    #[tokio::test]
    async fn bad_credentials_are_generic() {
        let service = service_with_admin(5).await;
        let app = create_router(service);

        for body in [
            json!({"username": "admin", "password": "wrong"}),
            json!({"username": "nobody", "password": "admin123"}),
        ] {
            let response = app.clone().oneshot(login_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(json_body(response).await["message"], "Invalid credentials");
        }
    }

    #[tokio::test]
    async fn unknown_admin_pays_for_a_hash_check() {
        let service = service_with_admin(5).await;
        let decoy = service.decoy_hash.as_deref().unwrap();
        assert!(!verify_password("admin123", decoy).unwrap());

        let err = service
            .login(
                "203.0.113.9".parse().unwrap(),
                LoginRequest {
                    username: "ghost".into(),
                    password: "admin123".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request_json() {
        let service = service_with_admin(5).await;
        let response = create_router(service)
            .oneshot(login_request(json!({"username": 42, "password": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn empty_fields_are_rejected() {
        let service = service_with_admin(5).await;
        let response = create_router(service)
            .oneshot(login_request(json!({"username": "admin"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn repeated_failures_are_throttled() {
        let service = service_with_admin(2).await;
        let app = create_router(service);
        let wrong = json!({"username": "admin", "password": "wrong"});

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(login_request(wrong.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app.oneshot(login_request(wrong)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
