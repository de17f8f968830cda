//! In-memory [`HotspotStore`] used by service tests and local experiments.
//!
//! Mirrors the constraints of the Postgres schema that the services rely on:
//! unique MAC addresses, unique checkout request ids, unique admin usernames
//! and the pending-only transaction finalization.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::{
    DbError, DbResult, PaginationParams,
    store::{HotspotStore, start_of_day},
    types::{
        Admin, DashboardStats, HotspotUser, HotspotUserUpdate, MpesaTransaction, NewAdmin,
        NewHotspotUser, NewPlan, NewRouter, NewTransaction, PlanRemoval, PlanUpdate, Router,
        RouterUpdate, SubscriptionPlan, TransactionOutcome, TransactionStatus, UserSession,
    },
};

#[derive(Default)]
struct Tables {
    admins: HashMap<Uuid, Admin>,
    plans: HashMap<Uuid, SubscriptionPlan>,
    routers: HashMap<Uuid, Router>,
    users: HashMap<Uuid, HotspotUser>,
    transactions: HashMap<Uuid, MpesaTransaction>,
    sessions: HashMap<Uuid, UserSession>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_plan(price: Decimal, duration_hours: i32, speed_mbps: i32) -> DbResult<()> {
    if price < Decimal::ZERO || duration_hours <= 0 || speed_mbps <= 0 {
        return Err(DbError::invalid_input(
            "Check constraint violated: subscription_plans",
        ));
    }
    Ok(())
}

#[async_trait]
impl HotspotStore for MemoryStore {
    async fn get_admin_by_username(&self, username: &str) -> DbResult<Admin> {
        self.tables
            .read()
            .admins
            .values()
            .find(|admin| admin.username == username)
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("admin", username))
    }

    async fn create_admin(&self, admin: NewAdmin) -> DbResult<Admin> {
        let mut tables = self.tables.write();
        if tables.admins.values().any(|a| a.username == admin.username) {
            return Err(DbError::duplicate("username", admin.username));
        }
        if tables.admins.values().any(|a| a.email == admin.email) {
            return Err(DbError::duplicate("email", admin.email));
        }

        let admin = Admin {
            id: Uuid::now_v7(),
            username: admin.username,
            password_hash: admin.password_hash,
            name: admin.name,
            email: admin.email,
            role: admin.role,
            created_at: Utc::now(),
        };
        tables.admins.insert(admin.id, admin.clone());
        Ok(admin)
    }

    async fn list_plans(&self, active_only: bool) -> DbResult<Vec<SubscriptionPlan>> {
        let mut plans: Vec<_> = self
            .tables
            .read()
            .plans
            .values()
            .filter(|plan| plan.is_active || !active_only)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    async fn get_plan(&self, id: Uuid) -> DbResult<SubscriptionPlan> {
        self.tables
            .read()
            .plans
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("plan", id.to_string()))
    }

    async fn create_plan(&self, plan: NewPlan) -> DbResult<SubscriptionPlan> {
        check_plan(plan.price, plan.duration_hours, plan.speed_mbps)?;

        let now = Utc::now();
        let plan = SubscriptionPlan {
            id: Uuid::now_v7(),
            name: plan.name,
            description: plan.description,
            price: plan.price,
            duration_hours: plan.duration_hours,
            speed_mbps: plan.speed_mbps,
            data_limit_gb: plan.data_limit_gb,
            is_active: plan.is_active,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn update_plan(&self, id: Uuid, update: PlanUpdate) -> DbResult<SubscriptionPlan> {
        let mut tables = self.tables.write();
        let plan = tables
            .plans
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found_with_id("plan", id.to_string()))?;

        let mut updated = plan.clone();
        if let Some(name) = update.name {
            updated.name = name;
        }
        if let Some(description) = update.description {
            updated.description = description;
        }
        if let Some(price) = update.price {
            updated.price = price;
        }
        if let Some(duration_hours) = update.duration_hours {
            updated.duration_hours = duration_hours;
        }
        if let Some(speed_mbps) = update.speed_mbps {
            updated.speed_mbps = speed_mbps;
        }
        if let Some(data_limit_gb) = update.data_limit_gb {
            updated.data_limit_gb = data_limit_gb;
        }
        if let Some(is_active) = update.is_active {
            updated.is_active = is_active;
        }
        check_plan(updated.price, updated.duration_hours, updated.speed_mbps)?;
        updated.updated_at = Utc::now();

        *plan = updated.clone();
        Ok(updated)
    }

    async fn remove_plan(&self, id: Uuid) -> DbResult<PlanRemoval> {
        let mut tables = self.tables.write();
        if !tables.plans.contains_key(&id) {
            return Err(DbError::not_found_with_id("plan", id.to_string()));
        }

        let referenced = tables.users.values().any(|u| u.plan_id == Some(id))
            || tables.transactions.values().any(|t| t.plan_id == Some(id));

        if referenced {
            if let Some(plan) = tables.plans.get_mut(&id) {
                plan.is_active = false;
                plan.updated_at = Utc::now();
            }
            debug!(plan_id = %id, "Plan still referenced, deactivated instead of deleted");
            Ok(PlanRemoval::Deactivated)
        } else {
            tables.plans.remove(&id);
            Ok(PlanRemoval::Deleted)
        }
    }

    async fn list_routers(&self, active_only: bool) -> DbResult<Vec<Router>> {
        let mut routers: Vec<_> = self
            .tables
            .read()
            .routers
            .values()
            .filter(|router| router.is_active || !active_only)
            .cloned()
            .collect();
        routers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(routers)
    }

    async fn get_router(&self, id: Uuid) -> DbResult<Router> {
        self.tables
            .read()
            .routers
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("router", id.to_string()))
    }

    async fn create_router(&self, router: NewRouter) -> DbResult<Router> {
        let router = Router {
            id: Uuid::now_v7(),
            name: router.name,
            host: router.host,
            port: router.port,
            username: router.username,
            password: router.password,
            is_active: router.is_active,
            last_seen: None,
            created_at: Utc::now(),
        };
        self.tables.write().routers.insert(router.id, router.clone());
        Ok(router)
    }

    async fn update_router(&self, id: Uuid, update: RouterUpdate) -> DbResult<Router> {
        let mut tables = self.tables.write();
        let router = tables
            .routers
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found_with_id("router", id.to_string()))?;

        if let Some(name) = update.name {
            router.name = name;
        }
        if let Some(host) = update.host {
            router.host = host;
        }
        if let Some(port) = update.port {
            router.port = port;
        }
        if let Some(username) = update.username {
            router.username = username;
        }
        if let Some(password) = update.password {
            router.password = password;
        }
        if let Some(is_active) = update.is_active {
            router.is_active = is_active;
        }
        Ok(router.clone())
    }

    async fn touch_router(&self, id: Uuid, seen_at: DateTime<Utc>) -> DbResult<()> {
        let mut tables = self.tables.write();
        let router = tables
            .routers
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found_with_id("router", id.to_string()))?;
        router.last_seen = Some(seen_at);
        Ok(())
    }

    async fn list_hotspot_users(
        &self,
        active_at: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<HotspotUser>> {
        let mut users: Vec<_> = self
            .tables
            .read()
            .users
            .values()
            .filter(|user| active_at.is_none_or(|now| user.has_access_at(now)))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn get_hotspot_user(&self, id: Uuid) -> DbResult<HotspotUser> {
        self.tables
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("hotspot user", id.to_string()))
    }

    async fn find_hotspot_user_by_mac(&self, mac_address: &str) -> DbResult<Option<HotspotUser>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|user| user.mac_address == mac_address)
            .cloned())
    }

    async fn create_hotspot_user(&self, user: NewHotspotUser) -> DbResult<HotspotUser> {
        let mut tables = self.tables.write();
        if tables
            .users
            .values()
            .any(|existing| existing.mac_address == user.mac_address)
        {
            return Err(DbError::duplicate("mac_address", user.mac_address));
        }

        let now = Utc::now();
        let user = HotspotUser {
            id: Uuid::now_v7(),
            mac_address: user.mac_address,
            phone_number: user.phone_number,
            plan_id: user.plan_id,
            router_id: user.router_id,
            username: user.username,
            password: user.password,
            is_active: false,
            expires_at: None,
            bytes_uploaded: 0,
            bytes_downloaded: 0,
            session_time: 0,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_hotspot_user(
        &self,
        id: Uuid,
        update: HotspotUserUpdate,
    ) -> DbResult<HotspotUser> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found_with_id("hotspot user", id.to_string()))?;

        if update.phone_number.is_some() {
            user.phone_number = update.phone_number;
        }
        if update.plan_id.is_some() {
            user.plan_id = update.plan_id;
        }
        if update.router_id.is_some() {
            user.router_id = update.router_id;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn activate_hotspot_user(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> DbResult<HotspotUser> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found_with_id("hotspot user", id.to_string()))?;
        user.is_active = true;
        user.expires_at = Some(expires_at);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn deactivate_hotspot_user(&self, id: Uuid) -> DbResult<HotspotUser> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found_with_id("hotspot user", id.to_string()))?;
        user.is_active = false;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_transactions(
        &self,
        params: PaginationParams,
    ) -> DbResult<Vec<MpesaTransaction>> {
        let mut transactions: Vec<_> = self.tables.read().transactions.values().cloned().collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(transactions
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .collect())
    }

    async fn get_transaction(&self, id: Uuid) -> DbResult<MpesaTransaction> {
        self.tables
            .read()
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("transaction", id.to_string()))
    }

    async fn get_transaction_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> DbResult<MpesaTransaction> {
        self.tables
            .read()
            .transactions
            .values()
            .find(|t| t.checkout_request_id.as_deref() == Some(checkout_request_id))
            .cloned()
            .ok_or_else(|| DbError::not_found_with_id("transaction", checkout_request_id))
    }

    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> DbResult<MpesaTransaction> {
        let mut tables = self.tables.write();
        if tables.transactions.values().any(|existing| {
            existing.checkout_request_id.as_deref() == Some(&transaction.checkout_request_id)
        }) {
            return Err(DbError::duplicate(
                "checkout_request_id",
                transaction.checkout_request_id,
            ));
        }
        if !tables.plans.contains_key(&transaction.plan_id) {
            return Err(DbError::ForeignKeyViolation {
                entity: "plan".into(),
            });
        }
        if !tables.users.contains_key(&transaction.user_id) {
            return Err(DbError::ForeignKeyViolation {
                entity: "hotspot user".into(),
            });
        }

        let now = Utc::now();
        let transaction = MpesaTransaction {
            id: Uuid::now_v7(),
            checkout_request_id: Some(transaction.checkout_request_id),
            merchant_request_id: Some(transaction.merchant_request_id),
            phone_number: transaction.phone_number,
            amount: transaction.amount,
            plan_id: Some(transaction.plan_id),
            user_id: Some(transaction.user_id),
            status: TransactionStatus::Pending,
            mpesa_receipt_number: None,
            transaction_date: None,
            callback_data: None,
            created_at: now,
            updated_at: now,
        };
        tables
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn finalize_transaction(
        &self,
        id: Uuid,
        outcome: TransactionOutcome,
    ) -> DbResult<Option<MpesaTransaction>> {
        let mut tables = self.tables.write();
        let Some(transaction) = tables.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if transaction.status.is_terminal() {
            return Ok(None);
        }

        transaction.status = outcome.status();
        match outcome {
            TransactionOutcome::Completed {
                receipt_number,
                transaction_date,
                callback_data,
            } => {
                transaction.mpesa_receipt_number = Some(receipt_number);
                if transaction_date.is_some() {
                    transaction.transaction_date = transaction_date;
                }
                transaction.callback_data = Some(callback_data);
            }
            TransactionOutcome::Failed { callback_data } => {
                transaction.callback_data = Some(callback_data);
            }
        }
        transaction.updated_at = Utc::now();
        Ok(Some(transaction.clone()))
    }

    async fn open_session(
        &self,
        user_id: Uuid,
        router_id: Uuid,
        session_id: Option<String>,
    ) -> DbResult<UserSession> {
        let session = UserSession {
            id: Uuid::now_v7(),
            user_id,
            router_id,
            session_id,
            start_time: Utc::now(),
            end_time: None,
            bytes_uploaded: 0,
            bytes_downloaded: 0,
            is_active: true,
        };
        self.tables
            .write()
            .sessions
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn active_sessions_for_user(&self, user_id: Uuid) -> DbResult<Vec<UserSession>> {
        let mut sessions: Vec<_> = self
            .tables
            .read()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    async fn end_session(&self, id: Uuid) -> DbResult<()> {
        if let Some(session) = self.tables.write().sessions.get_mut(&id)
            && session.is_active
        {
            session.is_active = false;
            session.end_time = Some(Utc::now());
        }
        Ok(())
    }

    async fn dashboard_stats(&self, now: DateTime<Utc>) -> DbResult<DashboardStats> {
        let tables = self.tables.read();
        let day_start = start_of_day(now);

        let completed = tables
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Completed);
        let today: Vec<_> = completed
            .clone()
            .filter(|t| t.transaction_date.unwrap_or(t.updated_at) >= day_start)
            .collect();

        Ok(DashboardStats {
            active_users: tables
                .users
                .values()
                .filter(|u| u.has_access_at(now))
                .count() as i64,
            total_revenue: completed.map(|t| t.amount).sum(),
            connected_routers: tables.routers.values().filter(|r| r.is_active).count() as i64,
            today_sales: today.iter().map(|t| t.amount).sum(),
            today_transactions: today.len() as i64,
        })
    }
}
