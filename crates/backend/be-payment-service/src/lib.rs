use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use be_remote_db::HotspotStore;
use be_router_service::RouterController;
use tower::ServiceBuilder;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod handlers;
pub mod provisioning;
pub mod state;

use state::AppState;

/// Public captive-portal routes: plan listing, payment initiation, the
/// provider webhook and status polling.
pub fn create_router(state: Arc<AppState>) -> Result<Router, PaymentError> {
    let initiate_governor = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .ok_or_else(|| PaymentError::Config("invalid rate limit configuration".into()))?;

    let initiate_route = Router::new()
        .route("/api/payment/initiate", post(handlers::initiate_payment))
        .layer(GovernorLayer::new(Arc::new(initiate_governor)));

    let public_routes = Router::new()
        .route("/api/plans", get(handlers::list_plans))
        .route(
            "/api/payment/status/{transaction_id}",
            get(handlers::payment_status),
        );

    let webhook_route =
        Router::new().route("/api/payment/callback", post(handlers::payment_callback));

    Ok(initiate_route
        .merge(public_routes)
        .merge(webhook_route)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state))
}

pub fn init_payment_service(
    store: Arc<dyn HotspotStore>,
    gateway: Arc<dyn gateway::PaymentGateway>,
    routers: Arc<dyn RouterController>,
) -> Result<Router> {
    debug!("Initializing payment service");

    let state = Arc::new(AppState::new(store, gateway, routers));

    create_router(state).context("Failed to create payment service router")
}

pub use config::{GatewayKind, MpesaConfig, MpesaEnvironment};
pub use error::PaymentError;
pub use gateway::{FakeGateway, MpesaClient, PaymentGateway};
pub use state::gateway_from_env;
