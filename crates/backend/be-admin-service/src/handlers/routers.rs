use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use be_auth_service::AdminSession;
use be_remote_db::{NewRouter, Router, RouterUpdate};
use be_router_service::{ActiveSession, profile_name};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::parse_id;
use crate::{error::AdminError, extract::JsonBody, state::AdminState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredRouter {
    #[serde(flatten)]
    pub router: Router,
    pub connection_test: bool,
}

fn require_text(value: Option<&str>, field: &str) -> Result<(), AdminError> {
    match value {
        Some(value) if value.trim().is_empty() => {
            Err(AdminError::Validation(format!("{field} is required")))
        }
        _ => Ok(()),
    }
}

fn validate_port(port: Option<i32>) -> Result<(), AdminError> {
    match port {
        Some(port) if !(1..=65535).contains(&port) => Err(AdminError::Validation(
            "Port must be between 1 and 65535".into(),
        )),
        _ => Ok(()),
    }
}

pub async fn list_routers(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<Vec<Router>>, AdminError> {
    Ok(Json(state.store.list_routers(false).await?))
}

pub async fn get_router(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<Router>, AdminError> {
    let id = parse_id(&id, "Router")?;
    let router = state
        .store
        .get_router(id)
        .await
        .map_err(AdminError::from_lookup("Router"))?;
    Ok(Json(router))
}

pub async fn create_router(
    session: AdminSession,
    State(state): State<Arc<AdminState>>,
    JsonBody(router): JsonBody<NewRouter>,
) -> Result<(StatusCode, Json<RegisteredRouter>), AdminError> {
    session.require_write()?;
    require_text(Some(router.name.as_str()), "Name")?;
    require_text(Some(router.host.as_str()), "Host")?;
    require_text(Some(router.username.as_str()), "Username")?;
    validate_port(Some(router.port))?;

    let mut router = state.store.create_router(router).await?;
    info!(router_id = %router.id, host = %router.host, by = %session.0.username, "Router registered");

    let connection_test = match state.routers.test_connection(&router).await {
        Ok(reachable) => reachable,
        Err(err) => {
            warn!(router_id = %router.id, error = %err, "Router connectivity test failed");
            false
        }
    };

    if connection_test {
        if let Err(err) = register_with_device(&state, &router).await {
            warn!(router_id = %router.id, error = %err, "Router setup incomplete");
        }
        let seen_at = Utc::now();
        state.store.touch_router(router.id, seen_at).await?;
        router.last_seen = Some(seen_at);
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisteredRouter {
            router,
            connection_test,
        }),
    ))
}

/// Connects to a new router and installs a profile per active plan speed.
async fn register_with_device(state: &AdminState, router: &Router) -> Result<(), AdminError> {
    state.routers.connect(router).await?;

    let mut speeds: Vec<i32> = state
        .store
        .list_plans(true)
        .await?
        .into_iter()
        .map(|plan| plan.speed_mbps)
        .collect();
    speeds.sort_unstable();
    speeds.dedup();

    for speed in speeds {
        state
            .routers
            .create_user_profile(router.id, &profile_name(speed), speed)
            .await?;
    }
    Ok(())
}

pub async fn update_router(
    session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<RouterUpdate>,
) -> Result<Json<Router>, AdminError> {
    session.require_write()?;
    let id = parse_id(&id, "Router")?;
    require_text(update.name.as_deref(), "Name")?;
    require_text(update.host.as_deref(), "Host")?;
    require_text(update.username.as_deref(), "Username")?;
    validate_port(update.port)?;

    let router = state
        .store
        .update_router(id, update)
        .await
        .map_err(AdminError::from_lookup("Router"))?;
    info!(router_id = %router.id, by = %session.0.username, "Router updated");
    Ok(Json(router))
}

pub async fn test_router(
    session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AdminError> {
    session.require_write()?;
    let id = parse_id(&id, "Router")?;
    let router = state
        .store
        .get_router(id)
        .await
        .map_err(AdminError::from_lookup("Router"))?;

    let success = match state.routers.test_connection(&router).await {
        Ok(reachable) => reachable,
        Err(err) => {
            warn!(router_id = %router.id, error = %err, "Router connectivity test failed");
            false
        }
    };
    if success {
        state.store.touch_router(router.id, Utc::now()).await?;
    }

    Ok(Json(json!({ "success": success })))
}

pub async fn router_sessions(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ActiveSession>>, AdminError> {
    let id = parse_id(&id, "Router")?;
    Ok(Json(state.routers.active_sessions(id).await?))
}
