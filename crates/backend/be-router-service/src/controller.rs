use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use be_remote_db::Router;

use crate::error::RouterResult;

/// Credential pushed to a router's hotspot user table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotspotCredential {
    pub username: String,
    pub password: String,
    pub mac_address: String,
    pub profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub id: String,
    pub username: String,
    pub address: String,
    pub mac_address: String,
    pub uptime: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Name of the rate-limit profile for a plan speed.
pub fn profile_name(speed_mbps: i32) -> String {
    format!("profile_{speed_mbps}M")
}

#[async_trait]
pub trait RouterController: Send + Sync {
    /// Opens a management connection. Returns whether the router answered.
    async fn connect(&self, router: &Router) -> RouterResult<bool>;

    async fn create_hotspot_user(
        &self,
        router_id: Uuid,
        credential: &HotspotCredential,
    ) -> RouterResult<()>;

    async fn enable_hotspot_user(&self, router_id: Uuid, username: &str) -> RouterResult<()>;

    async fn disable_hotspot_user(&self, router_id: Uuid, username: &str) -> RouterResult<()>;

    async fn delete_hotspot_user(&self, router_id: Uuid, username: &str) -> RouterResult<()>;

    async fn active_sessions(&self, router_id: Uuid) -> RouterResult<Vec<ActiveSession>>;

    async fn disconnect_session(&self, router_id: Uuid, session_id: &str) -> RouterResult<()>;

    async fn create_user_profile(
        &self,
        router_id: Uuid,
        name: &str,
        speed_mbps: i32,
    ) -> RouterResult<()>;

    async fn test_connection(&self, router: &Router) -> RouterResult<bool>;
}
