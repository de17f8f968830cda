//! Storage seam shared by the service crates.
//!
//! Services hold an `Arc<dyn HotspotStore>` so handlers can be exercised
//! against the in-memory store in tests and against Postgres in production.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::{
    DatabaseManager, DbError, DbResult, PaginationParams,
    types::{
        Admin, DashboardStats, HotspotUser, HotspotUserUpdate, MpesaTransaction, NewAdmin,
        NewHotspotUser, NewPlan, NewRouter, NewTransaction, PlanRemoval, PlanUpdate, Router,
        RouterUpdate, SubscriptionPlan, TransactionOutcome, UserSession,
    },
};

#[async_trait]
pub trait HotspotStore: Send + Sync {
    async fn get_admin_by_username(&self, username: &str) -> DbResult<Admin>;
    async fn create_admin(&self, admin: NewAdmin) -> DbResult<Admin>;

    async fn list_plans(&self, active_only: bool) -> DbResult<Vec<SubscriptionPlan>>;
    async fn get_plan(&self, id: Uuid) -> DbResult<SubscriptionPlan>;
    async fn create_plan(&self, plan: NewPlan) -> DbResult<SubscriptionPlan>;
    async fn update_plan(&self, id: Uuid, update: PlanUpdate) -> DbResult<SubscriptionPlan>;
    async fn remove_plan(&self, id: Uuid) -> DbResult<PlanRemoval>;

    async fn list_routers(&self, active_only: bool) -> DbResult<Vec<Router>>;
    async fn get_router(&self, id: Uuid) -> DbResult<Router>;
    async fn create_router(&self, router: NewRouter) -> DbResult<Router>;
    async fn update_router(&self, id: Uuid, update: RouterUpdate) -> DbResult<Router>;
    async fn touch_router(&self, id: Uuid, seen_at: DateTime<Utc>) -> DbResult<()>;

    /// All subscribers, or only those with access at `active_at` when given.
    async fn list_hotspot_users(
        &self,
        active_at: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<HotspotUser>>;
    async fn get_hotspot_user(&self, id: Uuid) -> DbResult<HotspotUser>;
    async fn find_hotspot_user_by_mac(&self, mac_address: &str) -> DbResult<Option<HotspotUser>>;
    async fn create_hotspot_user(&self, user: NewHotspotUser) -> DbResult<HotspotUser>;
    async fn update_hotspot_user(
        &self,
        id: Uuid,
        update: HotspotUserUpdate,
    ) -> DbResult<HotspotUser>;
    async fn activate_hotspot_user(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> DbResult<HotspotUser>;
    async fn deactivate_hotspot_user(&self, id: Uuid) -> DbResult<HotspotUser>;

    async fn list_transactions(&self, params: PaginationParams)
    -> DbResult<Vec<MpesaTransaction>>;
    async fn get_transaction(&self, id: Uuid) -> DbResult<MpesaTransaction>;
    async fn get_transaction_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> DbResult<MpesaTransaction>;
    async fn create_transaction(&self, transaction: NewTransaction)
    -> DbResult<MpesaTransaction>;
    /// Applies `outcome` only while the transaction is pending. `None` means
    /// the transaction had already reached a terminal state.
    async fn finalize_transaction(
        &self,
        id: Uuid,
        outcome: TransactionOutcome,
    ) -> DbResult<Option<MpesaTransaction>>;

    async fn open_session(
        &self,
        user_id: Uuid,
        router_id: Uuid,
        session_id: Option<String>,
    ) -> DbResult<UserSession>;
    async fn active_sessions_for_user(&self, user_id: Uuid) -> DbResult<Vec<UserSession>>;
    async fn end_session(&self, id: Uuid) -> DbResult<()>;

    async fn dashboard_stats(&self, now: DateTime<Utc>) -> DbResult<DashboardStats>;
}

/// UTC midnight of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[async_trait]
impl HotspotStore for DatabaseManager {
    async fn get_admin_by_username(&self, username: &str) -> DbResult<Admin> {
        self.get_admin_by_username().username(username).call().await
    }

    async fn create_admin(&self, admin: NewAdmin) -> DbResult<Admin> {
        self.create_admin()
            .username(admin.username)
            .password_hash(admin.password_hash)
            .name(admin.name)
            .email(admin.email)
            .role(admin.role)
            .call()
            .await
    }

    async fn list_plans(&self, active_only: bool) -> DbResult<Vec<SubscriptionPlan>> {
        self.list_plans().active_only(active_only).call().await
    }

    async fn get_plan(&self, id: Uuid) -> DbResult<SubscriptionPlan> {
        self.get_plan().id(id).call().await
    }

    async fn create_plan(&self, plan: NewPlan) -> DbResult<SubscriptionPlan> {
        self.create_plan()
            .name(plan.name)
            .maybe_description(plan.description)
            .price(plan.price)
            .duration_hours(plan.duration_hours)
            .speed_mbps(plan.speed_mbps)
            .maybe_data_limit_gb(plan.data_limit_gb)
            .is_active(plan.is_active)
            .call()
            .await
    }

    async fn update_plan(&self, id: Uuid, update: PlanUpdate) -> DbResult<SubscriptionPlan> {
        self.update_plan()
            .id(id)
            .maybe_name(update.name)
            .maybe_description(update.description)
            .maybe_price(update.price)
            .maybe_duration_hours(update.duration_hours)
            .maybe_speed_mbps(update.speed_mbps)
            .maybe_data_limit_gb(update.data_limit_gb)
            .maybe_is_active(update.is_active)
            .call()
            .await
    }

    async fn remove_plan(&self, id: Uuid) -> DbResult<PlanRemoval> {
        self.remove_plan().id(id).call().await
    }

    async fn list_routers(&self, active_only: bool) -> DbResult<Vec<Router>> {
        self.list_routers().active_only(active_only).call().await
    }

    async fn get_router(&self, id: Uuid) -> DbResult<Router> {
        self.get_router().id(id).call().await
    }

    async fn create_router(&self, router: NewRouter) -> DbResult<Router> {
        self.create_router()
            .name(router.name)
            .host(router.host)
            .port(router.port)
            .username(router.username)
            .password(router.password)
            .is_active(router.is_active)
            .call()
            .await
    }

    async fn update_router(&self, id: Uuid, update: RouterUpdate) -> DbResult<Router> {
        self.update_router()
            .id(id)
            .maybe_name(update.name)
            .maybe_host(update.host)
            .maybe_port(update.port)
            .maybe_username(update.username)
            .maybe_password(update.password)
            .maybe_is_active(update.is_active)
            .call()
            .await
    }

    async fn touch_router(&self, id: Uuid, seen_at: DateTime<Utc>) -> DbResult<()> {
        self.update_router_last_seen()
            .id(id)
            .seen_at(seen_at)
            .call()
            .await
    }

    async fn list_hotspot_users(
        &self,
        active_at: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<HotspotUser>> {
        self.list_hotspot_users()
            .maybe_active_at(active_at)
            .call()
            .await
    }

    async fn get_hotspot_user(&self, id: Uuid) -> DbResult<HotspotUser> {
        self.get_hotspot_user()
            .id(id)
            .call()
            .await?
            .ok_or_else(|| DbError::not_found_with_id("hotspot user", id.to_string()))
    }

    async fn find_hotspot_user_by_mac(&self, mac_address: &str) -> DbResult<Option<HotspotUser>> {
        self.get_hotspot_user()
            .mac_address(mac_address)
            .call()
            .await
    }

    async fn create_hotspot_user(&self, user: NewHotspotUser) -> DbResult<HotspotUser> {
        self.create_hotspot_user()
            .mac_address(user.mac_address)
            .maybe_phone_number(user.phone_number)
            .maybe_plan_id(user.plan_id)
            .maybe_router_id(user.router_id)
            .maybe_username(user.username)
            .maybe_password(user.password)
            .call()
            .await
    }

    async fn update_hotspot_user(
        &self,
        id: Uuid,
        update: HotspotUserUpdate,
    ) -> DbResult<HotspotUser> {
        self.update_hotspot_user()
            .id(id)
            .maybe_phone_number(update.phone_number)
            .maybe_plan_id(update.plan_id)
            .maybe_router_id(update.router_id)
            .call()
            .await
    }

    async fn activate_hotspot_user(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> DbResult<HotspotUser> {
        self.set_hotspot_user_access()
            .id(id)
            .is_active(true)
            .expires_at(expires_at)
            .call()
            .await
    }

    async fn deactivate_hotspot_user(&self, id: Uuid) -> DbResult<HotspotUser> {
        self.set_hotspot_user_access()
            .id(id)
            .is_active(false)
            .call()
            .await
    }

    async fn list_transactions(
        &self,
        params: PaginationParams,
    ) -> DbResult<Vec<MpesaTransaction>> {
        self.list_transactions().params(params).call().await
    }

    async fn get_transaction(&self, id: Uuid) -> DbResult<MpesaTransaction> {
        self.get_transaction().id(id).call().await
    }

    async fn get_transaction_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> DbResult<MpesaTransaction> {
        self.get_transaction()
            .checkout_request_id(checkout_request_id)
            .call()
            .await
    }

    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> DbResult<MpesaTransaction> {
        self.create_transaction()
            .checkout_request_id(transaction.checkout_request_id)
            .merchant_request_id(transaction.merchant_request_id)
            .phone_number(transaction.phone_number)
            .amount(transaction.amount)
            .plan_id(transaction.plan_id)
            .user_id(transaction.user_id)
            .call()
            .await
    }

    async fn finalize_transaction(
        &self,
        id: Uuid,
        outcome: TransactionOutcome,
    ) -> DbResult<Option<MpesaTransaction>> {
        self.finalize_transaction()
            .id(id)
            .outcome(outcome)
            .call()
            .await
    }

    async fn open_session(
        &self,
        user_id: Uuid,
        router_id: Uuid,
        session_id: Option<String>,
    ) -> DbResult<UserSession> {
        self.create_session()
            .user_id(user_id)
            .router_id(router_id)
            .maybe_session_id(session_id)
            .call()
            .await
    }

    async fn active_sessions_for_user(&self, user_id: Uuid) -> DbResult<Vec<UserSession>> {
        self.list_active_sessions().user_id(user_id).call().await
    }

    async fn end_session(&self, id: Uuid) -> DbResult<()> {
        self.end_session().id(id).call().await
    }

    async fn dashboard_stats(&self, now: DateTime<Utc>) -> DbResult<DashboardStats> {
        self.dashboard_stats()
            .now(now)
            .day_start(start_of_day(now))
            .call()
            .await
    }
}
