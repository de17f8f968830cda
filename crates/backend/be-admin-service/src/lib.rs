//! Dashboard API: plans, routers, subscribers and payment history.
//!
//! Every route requires an [`AdminSession`](be_auth_service::AdminSession);
//! write routes additionally require the `admin` role.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Extension, Router,
    routing::{get, post},
};
use be_auth_core::JwtConfig;
use be_payment_service::PaymentGateway;
use be_remote_db::HotspotStore;
use be_router_service::RouterController;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

pub use error::AdminError;
pub use state::AdminState;

use handlers::{plans, routers, stats, transactions, users};

pub fn create_router(state: Arc<AdminState>, jwt_config: Arc<JwtConfig>) -> Router {
    let api = Router::new()
        .route("/stats", get(stats::dashboard_stats))
        .route("/plans", get(plans::list_plans).post(plans::create_plan))
        .route(
            "/plans/{id}",
            get(plans::get_plan)
                .put(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route(
            "/routers",
            get(routers::list_routers).post(routers::create_router),
        )
        .route(
            "/routers/{id}",
            get(routers::get_router).put(routers::update_router),
        )
        .route("/routers/{id}/test", post(routers::test_router))
        .route("/routers/{id}/sessions", get(routers::router_sessions))
        .route("/users", get(users::list_users))
        .route("/users/active", get(users::list_active_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/deactivate", post(users::deactivate_user))
        .route("/transactions", get(transactions::list_transactions))
        .route(
            "/transactions/recent",
            get(transactions::recent_transactions),
        )
        .route("/transactions/{id}", get(transactions::get_transaction))
        .route(
            "/transactions/{id}/query",
            post(transactions::query_transaction),
        );

    Router::new()
        .nest("/api/admin", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(jwt_config)),
        )
        .with_state(state)
}

pub fn init_admin_service(
    store: Arc<dyn HotspotStore>,
    gateway: Arc<dyn PaymentGateway>,
    routers: Arc<dyn RouterController>,
    jwt_config: Arc<JwtConfig>,
) -> Result<Router> {
    debug!("Initializing admin service");

    let state = Arc::new(AdminState {
        store,
        gateway,
        routers,
    });

    Ok(create_router(state, jwt_config))
}
