use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use be_auth_service::AdminSession;
use be_remote_db::HotspotUser;
use chrono::Utc;
use tracing::{info, warn};

use super::parse_id;
use crate::{error::AdminError, state::AdminState};

pub async fn list_users(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<Vec<HotspotUser>>, AdminError> {
    Ok(Json(state.store.list_hotspot_users(None).await?))
}

pub async fn list_active_users(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<Vec<HotspotUser>>, AdminError> {
    Ok(Json(
        state.store.list_hotspot_users(Some(Utc::now())).await?,
    ))
}

pub async fn get_user(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<HotspotUser>, AdminError> {
    let id = parse_id(&id, "User")?;
    let user = state
        .store
        .get_hotspot_user(id)
        .await
        .map_err(AdminError::from_lookup("User"))?;
    Ok(Json(user))
}

/// Revokes a subscriber's access on the device and in the ledger.
///
/// Device-side failures are logged and do not block the store update, so an
/// unreachable router never leaves a subscriber marked active.
pub async fn deactivate_user(
    session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<HotspotUser>, AdminError> {
    session.require_write()?;
    let id = parse_id(&id, "User")?;
    let user = state
        .store
        .get_hotspot_user(id)
        .await
        .map_err(AdminError::from_lookup("User"))?;

    if let (Some(router_id), Some(username)) = (user.router_id, user.username.as_deref()) {
        if let Err(err) = state.routers.disable_hotspot_user(router_id, username).await {
            warn!(user_id = %user.id, %router_id, error = %err, "Failed to disable user on router");
        }
    }

    for session_row in state.store.active_sessions_for_user(user.id).await? {
        if let Some(device_session) = session_row.session_id.as_deref() {
            if let Err(err) = state
                .routers
                .disconnect_session(session_row.router_id, device_session)
                .await
            {
                warn!(session_id = %device_session, error = %err, "Failed to disconnect session");
            }
        }
        state.store.end_session(session_row.id).await?;
    }

    let user = state.store.deactivate_hotspot_user(user.id).await?;
    info!(user_id = %user.id, by = %session.0.username, "Hotspot user deactivated");
    Ok(Json(user))
}
