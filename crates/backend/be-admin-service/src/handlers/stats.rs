use std::sync::Arc;

use axum::{Json, extract::State};
use be_auth_service::AdminSession;
use be_remote_db::DashboardStats;
use chrono::Utc;

use crate::{error::AdminError, state::AdminState};

pub async fn dashboard_stats(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<DashboardStats>, AdminError> {
    Ok(Json(state.store.dashboard_stats(Utc::now()).await?))
}
