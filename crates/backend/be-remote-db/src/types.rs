use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationParams {
    offset: u32,
    limit: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self::new(0, Self::MAX_LIMIT)
    }
}

impl PaginationParams {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset as i64
    }

    pub fn limit(&self) -> i64 {
        self.limit as i64
    }
}

// ---------------------------------------------------------------------------
// Admins
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

// ---------------------------------------------------------------------------
// Subscription plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_hours: i32,
    pub speed_mbps: i32,
    #[serde(rename = "dataLimitGB")]
    pub data_limit_gb: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_hours: i32,
    pub speed_mbps: i32,
    #[serde(rename = "dataLimitGB")]
    pub data_limit_gb: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Maps an explicit JSON `null` to `Some(None)`; an absent field stays `None`
/// through `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial plan update. Absent fields keep their stored value; `description`
/// and `dataLimitGB` are cleared by sending `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanUpdate {
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    pub duration_hours: Option<i32>,
    pub speed_mbps: Option<i32>,
    #[serde(
        rename = "dataLimitGB",
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_limit_gb: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanRemoval {
    Deleted,
    /// The plan is still referenced by subscribers or transactions.
    Deactivated,
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

pub const DEFAULT_ROUTER_API_PORT: i32 = 8728;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    pub id: Uuid,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_active: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRouter {
    pub name: String,
    pub host: String,
    #[serde(default = "default_router_port")]
    pub port: i32,
    pub username: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterUpdate {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Hotspot users (subscribers)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HotspotUser {
    pub id: Uuid,
    pub mac_address: String,
    pub phone_number: Option<String>,
    pub plan_id: Option<Uuid>,
    pub router_id: Option<Uuid>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub bytes_uploaded: i64,
    pub bytes_downloaded: i64,
    pub session_time: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HotspotUser {
    /// Active flag set and expiry still in the future.
    pub fn has_access_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_some_and(|expires| expires >= now)
    }
}

#[derive(Debug, Clone)]
pub struct NewHotspotUser {
    pub mac_address: String,
    pub phone_number: Option<String>,
    pub plan_id: Option<Uuid>,
    pub router_id: Option<Uuid>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HotspotUserUpdate {
    pub phone_number: Option<String>,
    pub plan_id: Option<Uuid>,
    pub router_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// M-Pesa transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Failed => write!(f, "failed"),
            TransactionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MpesaTransaction {
    pub id: Uuid,
    pub checkout_request_id: Option<String>,
    pub merchant_request_id: Option<String>,
    pub phone_number: String,
    pub amount: Decimal,
    pub plan_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub mpesa_receipt_number: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub callback_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub phone_number: String,
    pub amount: Decimal,
    pub plan_id: Uuid,
    pub user_id: Uuid,
}

/// Terminal state written by the payment webhook.
#[derive(Debug, Clone)]
pub enum TransactionOutcome {
    Completed {
        receipt_number: String,
        transaction_date: Option<DateTime<Utc>>,
        callback_data: serde_json::Value,
    },
    Failed {
        callback_data: serde_json::Value,
    },
}

impl TransactionOutcome {
    pub fn status(&self) -> TransactionStatus {
        match self {
            TransactionOutcome::Completed { .. } => TransactionStatus::Completed,
            TransactionOutcome::Failed { .. } => TransactionStatus::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Device sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub router_id: Uuid,
    pub session_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub bytes_uploaded: i64,
    pub bytes_downloaded: i64,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_users: i64,
    pub total_revenue: Decimal,
    pub connected_routers: i64,
    pub today_sales: Decimal,
    pub today_transactions: i64,
}

fn default_true() -> bool {
    true
}

fn default_router_port() -> i32 {
    DEFAULT_ROUTER_API_PORT
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn plan_update_tells_null_from_absent() {
        let update: PlanUpdate =
            serde_json::from_str(r#"{"dataLimitGB": null, "price": "80"}"#).unwrap();
        assert_eq!(update.data_limit_gb, Some(None));
        assert_eq!(update.description, None);
        assert_eq!(update.price, Some(Decimal::new(80, 0)));

        let update: PlanUpdate =
            serde_json::from_str(r#"{"description": "Weekend", "dataLimitGB": 5}"#).unwrap();
        assert_eq!(update.description, Some(Some("Weekend".to_string())));
        assert_eq!(update.data_limit_gb, Some(Some(5)));
    }

    #[test]
    fn pagination_clamps_limit() {
        assert_eq!(PaginationParams::new(0, 1_000).limit(), 100);
        assert_eq!(PaginationParams::new(5, 0).limit(), 1);
        assert_eq!(PaginationParams::new(5, 10).offset(), 5);
    }

    #[test]
    fn new_plan_defaults_to_active() {
        let plan: NewPlan = serde_json::from_value(serde_json::json!({
            "name": "Basic",
            "price": "50.00",
            "durationHours": 24,
            "speedMbps": 5,
        }))
        .unwrap();
        assert!(plan.is_active);
        assert_eq!(plan.price, Decimal::new(50, 0));
        assert_eq!(plan.data_limit_gb, None);
    }

    #[test]
    fn new_router_defaults_port() {
        let router: NewRouter = serde_json::from_value(serde_json::json!({
            "name": "Lobby",
            "host": "10.0.0.1",
            "username": "api",
            "password": "secret",
        }))
        .unwrap();
        assert_eq!(router.port, DEFAULT_ROUTER_API_PORT);
    }

    #[test]
    fn router_password_is_not_serialized() {
        let router = Router {
            id: Uuid::now_v7(),
            name: "Lobby".into(),
            host: "10.0.0.1".into(),
            port: 8728,
            username: "api".into(),
            password: "secret".into(),
            is_active: true,
            last_seen: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&router).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["host"], "10.0.0.1");
    }

    #[test]
    fn access_requires_future_expiry() {
        let now = Utc::now();
        let mut user = HotspotUser {
            id: Uuid::now_v7(),
            mac_address: "AA:BB:CC:DD:EE:FF".into(),
            phone_number: None,
            plan_id: None,
            router_id: None,
            username: None,
            password: None,
            is_active: true,
            expires_at: Some(now + Duration::hours(1)),
            bytes_uploaded: 0,
            bytes_downloaded: 0,
            session_time: 0,
            created_at: now,
            updated_at: now,
        };
        assert!(user.has_access_at(now));

        user.expires_at = Some(now - Duration::minutes(1));
        assert!(!user.has_access_at(now));

        user.expires_at = None;
        assert!(!user.has_access_at(now));
    }

    #[test]
    fn only_pending_is_not_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
    }
}
