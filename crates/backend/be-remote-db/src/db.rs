use bon::bon;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{
    migrate::MigrateDatabase,
    postgres::{PgPool, PgPoolOptions},
};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    PaginationParams,
    error::{DbError, DbResult},
    types::{
        Admin, DashboardStats, HotspotUser, MpesaTransaction, PlanRemoval, Router,
        SubscriptionPlan, TransactionOutcome, TransactionStatus, UserSession,
    },
};

#[derive(Debug)]
pub struct DatabaseManager {
    pub pool: PgPool,
}

#[bon]
impl DatabaseManager {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if !sqlx::Postgres::database_exists(database_url).await? {
            sqlx::Postgres::create_database(database_url).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let db_manager = DatabaseManager { pool };

        Self::run_migrations(&db_manager.pool).await?;

        Ok(db_manager)
    }

    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        let migrator = sqlx::migrate!("./src/migrations");
        debug!(migrations = migrator.iter().count(), "Running database migrations");
        migrator.run(pool).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Admins
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn create_admin(
        &self,
        username: String,
        password_hash: String,
        name: String,
        email: String,
        role: String,
    ) -> DbResult<Admin> {
        let admin = sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (id, username, password_hash, name, email, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, password_hash, name, email, role, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&username)
        .bind(&password_hash)
        .bind(&name)
        .bind(&email)
        .bind(&role)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(admin)
    }

    #[builder]
    pub async fn get_admin_by_username(&self, username: &str) -> DbResult<Admin> {
        sqlx::query_as::<_, Admin>(
            r#"
            SELECT id, username, password_hash, name, email, role, created_at
            FROM admins
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("admin", username))
    }

    // -----------------------------------------------------------------------
    // Subscription plans
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn list_plans(&self, active_only: bool) -> DbResult<Vec<SubscriptionPlan>> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            SELECT id, name, description, price, duration_hours, speed_mbps, data_limit_gb,
                   is_active, created_at, updated_at
            FROM subscription_plans
            WHERE is_active OR NOT $1
            ORDER BY price ASC, name ASC
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }

    #[builder]
    pub async fn get_plan(&self, id: Uuid) -> DbResult<SubscriptionPlan> {
        sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            SELECT id, name, description, price, duration_hours, speed_mbps, data_limit_gb,
                   is_active, created_at, updated_at
            FROM subscription_plans
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("plan", id.to_string()))
    }

    #[builder]
    pub async fn create_plan(
        &self,
        name: String,
        description: Option<String>,
        price: Decimal,
        duration_hours: i32,
        speed_mbps: i32,
        data_limit_gb: Option<i32>,
        is_active: bool,
    ) -> DbResult<SubscriptionPlan> {
        let now = Utc::now();

        let plan = sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            INSERT INTO subscription_plans (
                id, name, description, price, duration_hours, speed_mbps, data_limit_gb,
                is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, name, description, price, duration_hours, speed_mbps, data_limit_gb,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&name)
        .bind(&description)
        .bind(price)
        .bind(duration_hours)
        .bind(speed_mbps)
        .bind(data_limit_gb)
        .bind(is_active)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(plan)
    }

    /// `Some(None)` for `description` or `data_limit_gb` clears the column.
    #[builder]
    pub async fn update_plan(
        &self,
        id: Uuid,
        name: Option<String>,
        description: Option<Option<String>>,
        price: Option<Decimal>,
        duration_hours: Option<i32>,
        speed_mbps: Option<i32>,
        data_limit_gb: Option<Option<i32>>,
        is_active: Option<bool>,
    ) -> DbResult<SubscriptionPlan> {
        sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            UPDATE subscription_plans
            SET name = COALESCE($2, name),
                description = CASE WHEN $10 THEN $3 ELSE description END,
                price = COALESCE($4, price),
                duration_hours = COALESCE($5, duration_hours),
                speed_mbps = COALESCE($6, speed_mbps),
                data_limit_gb = CASE WHEN $11 THEN $7 ELSE data_limit_gb END,
                is_active = COALESCE($8, is_active),
                updated_at = $9
            WHERE id = $1
            RETURNING id, name, description, price, duration_hours, speed_mbps, data_limit_gb,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(description.clone().flatten())
        .bind(price)
        .bind(duration_hours)
        .bind(speed_mbps)
        .bind(data_limit_gb.flatten())
        .bind(is_active)
        .bind(Utc::now())
        .bind(description.is_some())
        .bind(data_limit_gb.is_some())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("plan", id.to_string()))
    }

    /// Deletes an unreferenced plan; a plan still referenced by subscribers or
    /// transactions is deactivated instead.
    #[builder]
    pub async fn remove_plan(&self, id: Uuid) -> DbResult<PlanRemoval> {
        let mut tx = self.pool.begin().await?;

        let referenced: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM hotspot_users WHERE plan_id = $1)
                OR EXISTS (SELECT 1 FROM mpesa_transactions WHERE plan_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let (query, removal) = if referenced.0 {
            (
                "UPDATE subscription_plans SET is_active = false, updated_at = now() WHERE id = $1",
                PlanRemoval::Deactivated,
            )
        } else {
            (
                "DELETE FROM subscription_plans WHERE id = $1",
                PlanRemoval::Deleted,
            )
        };

        let result = sqlx::query(query).bind(id).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("plan", id.to_string()));
        }

        tx.commit().await?;

        if removal == PlanRemoval::Deactivated {
            info!(plan_id = %id, "Plan still referenced, deactivated instead of deleted");
        }

        Ok(removal)
    }

    // -----------------------------------------------------------------------
    // Routers
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn list_routers(&self, active_only: bool) -> DbResult<Vec<Router>> {
        let routers = sqlx::query_as::<_, Router>(
            r#"
            SELECT id, name, host, port, username, password, is_active, last_seen, created_at
            FROM mikrotik_routers
            WHERE is_active OR NOT $1
            ORDER BY name ASC
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(routers)
    }

    #[builder]
    pub async fn get_router(&self, id: Uuid) -> DbResult<Router> {
        sqlx::query_as::<_, Router>(
            r#"
            SELECT id, name, host, port, username, password, is_active, last_seen, created_at
            FROM mikrotik_routers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("router", id.to_string()))
    }

    #[builder]
    pub async fn create_router(
        &self,
        name: String,
        host: String,
        port: i32,
        username: String,
        password: String,
        is_active: bool,
    ) -> DbResult<Router> {
        let router = sqlx::query_as::<_, Router>(
            r#"
            INSERT INTO mikrotik_routers (id, name, host, port, username, password, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, host, port, username, password, is_active, last_seen, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&name)
        .bind(&host)
        .bind(port)
        .bind(&username)
        .bind(&password)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(router)
    }

    #[builder]
    pub async fn update_router(
        &self,
        id: Uuid,
        name: Option<String>,
        host: Option<String>,
        port: Option<i32>,
        username: Option<String>,
        password: Option<String>,
        is_active: Option<bool>,
    ) -> DbResult<Router> {
        sqlx::query_as::<_, Router>(
            r#"
            UPDATE mikrotik_routers
            SET name = COALESCE($2, name),
                host = COALESCE($3, host),
                port = COALESCE($4, port),
                username = COALESCE($5, username),
                password = COALESCE($6, password),
                is_active = COALESCE($7, is_active)
            WHERE id = $1
            RETURNING id, name, host, port, username, password, is_active, last_seen, created_at
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(&host)
        .bind(port)
        .bind(&username)
        .bind(&password)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("router", id.to_string()))
    }

    #[builder]
    pub async fn update_router_last_seen(&self, id: Uuid, seen_at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE mikrotik_routers
            SET last_seen = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(seen_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("router", id.to_string()));
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Hotspot users
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn list_hotspot_users(
        &self,
        active_at: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<HotspotUser>> {
        let users = sqlx::query_as::<_, HotspotUser>(
            r#"
            SELECT id, mac_address, phone_number, plan_id, router_id, username, password,
                   is_active, expires_at, bytes_uploaded, bytes_downloaded, session_time,
                   created_at, updated_at
            FROM hotspot_users
            WHERE $1::timestamptz IS NULL OR (is_active AND expires_at >= $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(active_at)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    #[builder]
    pub async fn get_hotspot_user(
        &self,
        id: Option<Uuid>,
        mac_address: Option<&str>,
    ) -> DbResult<Option<HotspotUser>> {
        let (clause, bind_value) = match (id, mac_address) {
            (Some(id), _) => ("id = $1::uuid", id.to_string()),
            (_, Some(mac)) => ("mac_address = $1", mac.to_string()),
            _ => {
                return Err(DbError::Internal(
                    "get_hotspot_user requires at least one filter".into(),
                ));
            }
        };

        let query = format!(
            r#"
            SELECT id, mac_address, phone_number, plan_id, router_id, username, password,
                   is_active, expires_at, bytes_uploaded, bytes_downloaded, session_time,
                   created_at, updated_at
            FROM hotspot_users
            WHERE {clause}
            "#
        );

        let user = sqlx::query_as::<_, HotspotUser>(&query)
            .bind(bind_value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[builder]
    pub async fn create_hotspot_user(
        &self,
        mac_address: String,
        phone_number: Option<String>,
        plan_id: Option<Uuid>,
        router_id: Option<Uuid>,
        username: Option<String>,
        password: Option<String>,
    ) -> DbResult<HotspotUser> {
        let now = Utc::now();

        let user = sqlx::query_as::<_, HotspotUser>(
            r#"
            INSERT INTO hotspot_users (
                id, mac_address, phone_number, plan_id, router_id, username, password,
                is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, false, $8, $9)
            RETURNING id, mac_address, phone_number, plan_id, router_id, username, password,
                      is_active, expires_at, bytes_uploaded, bytes_downloaded, session_time,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&mac_address)
        .bind(&phone_number)
        .bind(plan_id)
        .bind(router_id)
        .bind(&username)
        .bind(&password)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    #[builder]
    pub async fn update_hotspot_user(
        &self,
        id: Uuid,
        phone_number: Option<String>,
        plan_id: Option<Uuid>,
        router_id: Option<Uuid>,
    ) -> DbResult<HotspotUser> {
        sqlx::query_as::<_, HotspotUser>(
            r#"
            UPDATE hotspot_users
            SET phone_number = COALESCE($2, phone_number),
                plan_id = COALESCE($3, plan_id),
                router_id = COALESCE($4, router_id),
                updated_at = $5
            WHERE id = $1
            RETURNING id, mac_address, phone_number, plan_id, router_id, username, password,
                      is_active, expires_at, bytes_uploaded, bytes_downloaded, session_time,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&phone_number)
        .bind(plan_id)
        .bind(router_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("hotspot user", id.to_string()))
    }

    /// Sets the active flag. `expires_at` is only written when activating.
    #[builder]
    pub async fn set_hotspot_user_access(
        &self,
        id: Uuid,
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<HotspotUser> {
        sqlx::query_as::<_, HotspotUser>(
            r#"
            UPDATE hotspot_users
            SET is_active = $2,
                expires_at = COALESCE($3, expires_at),
                updated_at = $4
            WHERE id = $1
            RETURNING id, mac_address, phone_number, plan_id, router_id, username, password,
                      is_active, expires_at, bytes_uploaded, bytes_downloaded, session_time,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(is_active)
        .bind(expires_at)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("hotspot user", id.to_string()))
    }

    // -----------------------------------------------------------------------
    // M-Pesa transactions
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn list_transactions(
        &self,
        params: PaginationParams,
    ) -> DbResult<Vec<MpesaTransaction>> {
        let transactions = sqlx::query_as::<_, MpesaTransaction>(
            r#"
            SELECT id, checkout_request_id, merchant_request_id, phone_number, amount, plan_id,
                   user_id, status, mpesa_receipt_number, transaction_date, callback_data,
                   created_at, updated_at
            FROM mpesa_transactions
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    #[builder]
    pub async fn get_transaction(
        &self,
        id: Option<Uuid>,
        checkout_request_id: Option<&str>,
    ) -> DbResult<MpesaTransaction> {
        let (clause, bind_value) = match (id, checkout_request_id) {
            (Some(id), _) => ("id = $1::uuid", id.to_string()),
            (_, Some(checkout)) => ("checkout_request_id = $1", checkout.to_string()),
            _ => {
                return Err(DbError::Internal(
                    "get_transaction requires at least one filter".into(),
                ));
            }
        };

        let query = format!(
            r#"
            SELECT id, checkout_request_id, merchant_request_id, phone_number, amount, plan_id,
                   user_id, status, mpesa_receipt_number, transaction_date, callback_data,
                   created_at, updated_at
            FROM mpesa_transactions
            WHERE {clause}
            "#
        );

        sqlx::query_as::<_, MpesaTransaction>(&query)
            .bind(&bind_value)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("transaction", bind_value))
    }

    #[builder]
    pub async fn create_transaction(
        &self,
        checkout_request_id: String,
        merchant_request_id: String,
        phone_number: String,
        amount: Decimal,
        plan_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<MpesaTransaction> {
        let now = Utc::now();

        let transaction = sqlx::query_as::<_, MpesaTransaction>(
            r#"
            INSERT INTO mpesa_transactions (
                id, checkout_request_id, merchant_request_id, phone_number, amount, plan_id,
                user_id, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, checkout_request_id, merchant_request_id, phone_number, amount, plan_id,
                      user_id, status, mpesa_receipt_number, transaction_date, callback_data,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&checkout_request_id)
        .bind(&merchant_request_id)
        .bind(&phone_number)
        .bind(amount)
        .bind(plan_id)
        .bind(user_id)
        .bind(TransactionStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// Moves a pending transaction to its terminal state. Returns `None` when
    /// the row is no longer pending so replayed webhooks cannot flip it.
    #[builder]
    pub async fn finalize_transaction(
        &self,
        id: Uuid,
        outcome: TransactionOutcome,
    ) -> DbResult<Option<MpesaTransaction>> {
        let status = outcome.status();
        let (receipt_number, transaction_date, callback_data) = match outcome {
            TransactionOutcome::Completed {
                receipt_number,
                transaction_date,
                callback_data,
            } => (Some(receipt_number), transaction_date, callback_data),
            TransactionOutcome::Failed { callback_data } => (None, None, callback_data),
        };

        let transaction = sqlx::query_as::<_, MpesaTransaction>(
            r#"
            UPDATE mpesa_transactions
            SET status = $2,
                mpesa_receipt_number = COALESCE($3, mpesa_receipt_number),
                transaction_date = COALESCE($4, transaction_date),
                callback_data = $5,
                updated_at = $6
            WHERE id = $1 AND status = 'pending'
            RETURNING id, checkout_request_id, merchant_request_id, phone_number, amount, plan_id,
                      user_id, status, mpesa_receipt_number, transaction_date, callback_data,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(&receipt_number)
        .bind(transaction_date)
        .bind(&callback_data)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    // -----------------------------------------------------------------------
    // Device sessions
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn create_session(
        &self,
        user_id: Uuid,
        router_id: Uuid,
        session_id: Option<String>,
    ) -> DbResult<UserSession> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (id, user_id, router_id, session_id, start_time, is_active)
            VALUES ($1, $2, $3, $4, $5, true)
            RETURNING id, user_id, router_id, session_id, start_time, end_time,
                      bytes_uploaded, bytes_downloaded, is_active
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(router_id)
        .bind(&session_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    #[builder]
    pub async fn list_active_sessions(&self, user_id: Uuid) -> DbResult<Vec<UserSession>> {
        let sessions = sqlx::query_as::<_, UserSession>(
            r#"
            SELECT id, user_id, router_id, session_id, start_time, end_time,
                   bytes_uploaded, bytes_downloaded, is_active
            FROM user_sessions
            WHERE user_id = $1 AND is_active
            ORDER BY start_time DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    #[builder]
    pub async fn end_session(&self, id: Uuid) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE user_sessions
            SET end_time = $2, is_active = false
            WHERE id = $1 AND is_active
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dashboard
    // -----------------------------------------------------------------------

    #[builder]
    pub async fn dashboard_stats(
        &self,
        now: DateTime<Utc>,
        day_start: DateTime<Utc>,
    ) -> DbResult<DashboardStats> {
        let stats = sqlx::query_as::<_, DashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM hotspot_users
                 WHERE is_active AND expires_at >= $1) AS active_users,
                (SELECT COALESCE(SUM(amount), 0) FROM mpesa_transactions
                 WHERE status = 'completed') AS total_revenue,
                (SELECT COUNT(*) FROM mikrotik_routers
                 WHERE is_active) AS connected_routers,
                (SELECT COALESCE(SUM(amount), 0) FROM mpesa_transactions
                 WHERE status = 'completed'
                   AND COALESCE(transaction_date, updated_at) >= $2) AS today_sales,
                (SELECT COUNT(*) FROM mpesa_transactions
                 WHERE status = 'completed'
                   AND COALESCE(transaction_date, updated_at) >= $2) AS today_transactions
            "#,
        )
        .bind(now)
        .bind(day_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
