use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use be_auth_service::AdminSession;
use be_remote_db::{NewPlan, PlanRemoval, PlanUpdate, SubscriptionPlan};
use be_router_service::profile_name;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::parse_id;
use crate::{error::AdminError, extract::JsonBody, state::AdminState};

fn validate_fields(
    name: Option<&str>,
    price: Option<Decimal>,
    duration_hours: Option<i32>,
    speed_mbps: Option<i32>,
    data_limit_gb: Option<i32>,
) -> Result<(), AdminError> {
    if name.is_some_and(|name| name.trim().is_empty()) {
        return Err(AdminError::Validation("Plan name is required".into()));
    }
    if price.is_some_and(|price| price < Decimal::ZERO) {
        return Err(AdminError::Validation("Price cannot be negative".into()));
    }
    if duration_hours.is_some_and(|hours| hours <= 0) {
        return Err(AdminError::Validation(
            "Duration must be at least one hour".into(),
        ));
    }
    if speed_mbps.is_some_and(|speed| speed <= 0) {
        return Err(AdminError::Validation("Speed must be positive".into()));
    }
    if data_limit_gb.is_some_and(|limit| limit <= 0) {
        return Err(AdminError::Validation("Data limit must be positive".into()));
    }
    Ok(())
}

pub async fn list_plans(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<Vec<SubscriptionPlan>>, AdminError> {
    Ok(Json(state.store.list_plans(false).await?))
}

pub async fn get_plan(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<SubscriptionPlan>, AdminError> {
    let id = parse_id(&id, "Plan")?;
    let plan = state
        .store
        .get_plan(id)
        .await
        .map_err(AdminError::from_lookup("Plan"))?;
    Ok(Json(plan))
}

pub async fn create_plan(
    session: AdminSession,
    State(state): State<Arc<AdminState>>,
    JsonBody(plan): JsonBody<NewPlan>,
) -> Result<(StatusCode, Json<SubscriptionPlan>), AdminError> {
    session.require_write()?;
    validate_fields(
        Some(plan.name.as_str()),
        Some(plan.price),
        Some(plan.duration_hours),
        Some(plan.speed_mbps),
        plan.data_limit_gb,
    )?;

    let plan = state
        .store
        .create_plan(NewPlan {
            name: plan.name.trim().to_string(),
            ..plan
        })
        .await?;
    info!(plan_id = %plan.id, name = %plan.name, by = %session.0.username, "Plan created");

    push_profile_to_routers(&state, &plan).await;

    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_plan(
    session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<PlanUpdate>,
) -> Result<Json<SubscriptionPlan>, AdminError> {
    session.require_write()?;
    let id = parse_id(&id, "Plan")?;
    validate_fields(
        update.name.as_deref(),
        update.price,
        update.duration_hours,
        update.speed_mbps,
        update.data_limit_gb.flatten(),
    )?;

    let plan = state
        .store
        .update_plan(id, update)
        .await
        .map_err(AdminError::from_lookup("Plan"))?;
    info!(plan_id = %plan.id, by = %session.0.username, "Plan updated");
    Ok(Json(plan))
}

pub async fn delete_plan(
    session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AdminError> {
    session.require_write()?;
    let id = parse_id(&id, "Plan")?;

    let removal = state
        .store
        .remove_plan(id)
        .await
        .map_err(AdminError::from_lookup("Plan"))?;

    match removal {
        PlanRemoval::Deleted => {
            info!(plan_id = %id, by = %session.0.username, "Plan deleted");
            Ok(Json(json!({ "success": true })))
        }
        PlanRemoval::Deactivated => {
            info!(plan_id = %id, by = %session.0.username, "Plan in use, deactivated");
            Ok(Json(json!({ "success": true, "deactivated": true })))
        }
    }
}

/// Creates the plan's rate-limit profile on every active router.
async fn push_profile_to_routers(state: &AdminState, plan: &SubscriptionPlan) {
    let routers = match state.store.list_routers(true).await {
        Ok(routers) => routers,
        Err(err) => {
            warn!(error = %err, "Could not list routers for profile sync");
            return;
        }
    };

    let profile = profile_name(plan.speed_mbps);
    for router in routers {
        if let Err(err) = state
            .routers
            .create_user_profile(router.id, &profile, plan.speed_mbps)
            .await
        {
            warn!(router_id = %router.id, %profile, error = %err, "Profile sync failed");
        }
    }
}
