use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{any, get},
};
use be_admin_service::init_admin_service;
use be_auth_core::JwtConfig;
use be_auth_service::AdminAuthService;
use be_payment_service::{PaymentGateway, gateway_from_env, init_payment_service};
use be_remote_db::{DatabaseManager, HotspotStore};
use be_router_service::{RouterController, SimulatedRouterClient, StoreRegistry};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

/// Configuration for running the monolith server.
pub struct ServerConfig {
    pub database_url: String,
    pub http_addr: SocketAddr,
    /// Directory holding `portal/` and `admin/` front ends.
    pub web_root: PathBuf,
    /// When this receiver gets a value, the server shuts down gracefully.
    pub shutdown: tokio::sync::watch::Receiver<()>,
}

fn build_cors() -> CorsLayer {
    let allowed: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173".into())
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<HeaderValue>().ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Unmatched `/api` paths get a JSON 404 instead of the portal page.
async fn api_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "message": "Not found" })),
    )
}

/// Portal at `/`, dashboard at `/admin/`.
fn static_routes(web_root: &std::path::Path) -> Router {
    let portal = web_root.join("portal");
    let admin = web_root.join("admin");

    Router::new()
        .nest_service(
            "/admin",
            ServeDir::new(&admin).fallback(ServeFile::new(admin.join("index.html"))),
        )
        .fallback_service(
            ServeDir::new(&portal).fallback(ServeFile::new(portal.join("index.html"))),
        )
}

/// Assembles every HTTP surface over the given dependencies.
pub fn build_app(
    store: Arc<dyn HotspotStore>,
    gateway: Arc<dyn PaymentGateway>,
    routers: Arc<dyn RouterController>,
    jwt_config: Arc<JwtConfig>,
    web_root: &std::path::Path,
) -> anyhow::Result<Router> {
    let payment_router = init_payment_service(store.clone(), gateway.clone(), routers.clone())?;
    let auth_router = be_auth_service::create_router(Arc::new(AdminAuthService::new(
        store.clone(),
        jwt_config.clone(),
    )));
    let admin_router = init_admin_service(store, gateway, routers, jwt_config)?;

    let health_route = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/api", any(api_not_found))
        .route("/api/{*rest}", any(api_not_found));

    Ok(payment_router
        .merge(auth_router)
        .merge(admin_router)
        .merge(health_route)
        .merge(static_routes(web_root))
        .layer(build_cors()))
}

pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let store: Arc<dyn HotspotStore> = Arc::new(DatabaseManager::new(&config.database_url).await?);

    let gateway = gateway_from_env()?;
    let routers: Arc<dyn RouterController> = Arc::new(SimulatedRouterClient::new(Arc::new(
        StoreRegistry::new(store.clone()),
    )));
    let jwt_config = Arc::new(JwtConfig::from_env()?);

    let http_router = build_app(store, gateway, routers, jwt_config, &config.web_root)?;

    tracing::info!("Starting HTTP server at {}", config.http_addr);
    tracing::info!("Serving front ends from {}", config.web_root.display());

    let mut http_shutdown = config.shutdown.clone();
    let http_listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(
        http_listener,
        http_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
        tracing::info!("Shutting down HTTP server...");
    })
    .await
    .map_err(|e| {
        tracing::error!("HTTP server error: {}", e);
        e
    })?;

    Ok(())
}
