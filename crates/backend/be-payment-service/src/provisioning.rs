//! Subscriber lifecycle around a payment: find-or-create before the push,
//! activation and device access after a successful callback.

use be_remote_db::{
    HotspotUser, HotspotUserUpdate, MpesaTransaction, NewHotspotUser, SubscriptionPlan,
    TransactionStatus,
};
use be_router_service::{HotspotCredential, RouterError, profile_name};
use chrono::{Duration, Utc};
use rand::{Rng, distr::Alphanumeric};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{error::PaymentError, state::AppState};

const GENERATED_PASSWORD_LEN: usize = 8;

pub fn hotspot_username(mac_address: &str) -> String {
    format!("user_{}", mac_address.replace(':', ""))
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Returns the subscriber for `mac_address`, creating it on first purchase.
///
/// Existing subscribers have plan and phone refreshed, and the router only
/// when the portal supplied one.
pub async fn find_or_create_subscriber(
    state: &AppState,
    mac_address: &str,
    phone_number: &str,
    plan: &SubscriptionPlan,
    router_id: Option<Uuid>,
) -> Result<HotspotUser, PaymentError> {
    let update = HotspotUserUpdate {
        phone_number: Some(phone_number.to_string()),
        plan_id: Some(plan.id),
        router_id,
    };

    if let Some(existing) = state.store.find_hotspot_user_by_mac(mac_address).await? {
        return Ok(state.store.update_hotspot_user(existing.id, update).await?);
    }

    let router_id = match router_id {
        Some(id) => Some(id),
        None => state
            .store
            .list_routers(true)
            .await?
            .first()
            .map(|router| router.id),
    };

    let created = state
        .store
        .create_hotspot_user(NewHotspotUser {
            mac_address: mac_address.to_string(),
            phone_number: Some(phone_number.to_string()),
            plan_id: Some(plan.id),
            router_id,
            username: Some(hotspot_username(mac_address)),
            password: Some(generate_password()),
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = %user.id, %mac_address, "Created hotspot subscriber");
            Ok(user)
        }
        // Another request for the same device won the insert.
        Err(err) if err.is_duplicate() => {
            let existing = state
                .store
                .find_hotspot_user_by_mac(mac_address)
                .await?
                .ok_or(PaymentError::Database(err))?;
            Ok(state.store.update_hotspot_user(existing.id, update).await?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Activates the subscriber paid for by `transaction` and grants access on
/// their router. Device failures are logged and do not fail the callback.
pub async fn activate_subscription(
    state: &AppState,
    transaction: &MpesaTransaction,
) -> Result<(), PaymentError> {
    let (Some(plan_id), Some(user_id)) = (transaction.plan_id, transaction.user_id) else {
        warn!(
            transaction_id = %transaction.id,
            "Completed transaction has no plan or subscriber"
        );
        return Ok(());
    };

    let plan = state.store.get_plan(plan_id).await?;
    let expires_at = Utc::now() + Duration::hours(i64::from(plan.duration_hours));
    let user = state
        .store
        .activate_hotspot_user(user_id, expires_at)
        .await?;

    info!(
        user_id = %user.id,
        transaction_id = %transaction.id,
        %expires_at,
        "Activated hotspot subscriber"
    );

    let Some(router_id) = user.router_id else {
        warn!(user_id = %user.id, "Subscriber has no router, skipping device provisioning");
        return Ok(());
    };

    if let Err(err) = grant_device_access(state, &user, &plan, router_id).await {
        error!(
            user_id = %user.id,
            %router_id,
            error = %err,
            "Payment completed but device provisioning failed"
        );
    }

    Ok(())
}

/// Re-runs activation for a completed transaction whose subscriber never got
/// access, which happens when the first callback failed after finalizing.
/// Returns whether activation ran.
pub async fn resume_activation(
    state: &AppState,
    transaction: &MpesaTransaction,
) -> Result<bool, PaymentError> {
    if transaction.status != TransactionStatus::Completed {
        return Ok(false);
    }
    let Some(user_id) = transaction.user_id else {
        return Ok(false);
    };

    let user = state.store.get_hotspot_user(user_id).await?;
    let activated_since = user
        .expires_at
        .is_some_and(|expires_at| expires_at > transaction.updated_at);
    if user.is_active || activated_since {
        return Ok(false);
    }

    warn!(
        transaction_id = %transaction.id,
        user_id = %user.id,
        "Completed transaction left subscriber inactive, retrying activation"
    );
    activate_subscription(state, transaction).await?;
    Ok(true)
}

#[derive(Debug, thiserror::Error)]
enum ProvisioningError {
    #[error("subscriber has no hotspot credentials")]
    MissingCredentials,
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Store(#[from] be_remote_db::DbError),
}

async fn grant_device_access(
    state: &AppState,
    user: &HotspotUser,
    plan: &SubscriptionPlan,
    router_id: Uuid,
) -> Result<(), ProvisioningError> {
    let (Some(username), Some(password)) = (&user.username, &user.password) else {
        return Err(ProvisioningError::MissingCredentials);
    };

    let credential = HotspotCredential {
        username: username.clone(),
        password: password.clone(),
        mac_address: user.mac_address.clone(),
        profile: profile_name(plan.speed_mbps),
    };

    state
        .routers
        .create_hotspot_user(router_id, &credential)
        .await?;
    state.routers.enable_hotspot_user(router_id, username).await?;
    state.store.open_session(user.id, router_id, None).await?;

    Ok(())
}
