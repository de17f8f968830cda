use std::sync::Arc;

use async_trait::async_trait;
use be_remote_db::Router;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    controller::{ActiveSession, HotspotCredential, RouterController},
    error::{RouterError, RouterResult},
    registry::RouterRegistry,
};

/// Router client that never talks to a device.
///
/// Routers are resolved through the injected registry on every call, so a
/// router removed or deactivated in the store is rejected immediately and
/// nothing needs to be re-registered after a restart.
#[derive(Clone)]
pub struct SimulatedRouterClient {
    registry: Arc<dyn RouterRegistry>,
}

impl SimulatedRouterClient {
    pub fn new(registry: Arc<dyn RouterRegistry>) -> Self {
        Self { registry }
    }

    async fn active_router(&self, router_id: Uuid) -> RouterResult<Router> {
        let router = self.registry.lookup(router_id).await?;
        if !router.is_active {
            return Err(RouterError::Inactive(router_id));
        }
        Ok(router)
    }
}

#[async_trait]
impl RouterController for SimulatedRouterClient {
    async fn connect(&self, router: &Router) -> RouterResult<bool> {
        if !router.is_active {
            return Err(RouterError::Inactive(router.id));
        }
        info!(
            router_id = %router.id,
            router = %router.name,
            host = %router.host,
            port = router.port,
            "Connected to router (simulated)"
        );
        Ok(true)
    }

    async fn create_hotspot_user(
        &self,
        router_id: Uuid,
        credential: &HotspotCredential,
    ) -> RouterResult<()> {
        let router = self.active_router(router_id).await?;
        info!(
            router = %router.name,
            username = %credential.username,
            mac_address = %credential.mac_address,
            profile = %credential.profile,
            "Creating hotspot user (simulated)"
        );
        Ok(())
    }

    async fn enable_hotspot_user(&self, router_id: Uuid, username: &str) -> RouterResult<()> {
        let router = self.active_router(router_id).await?;
        info!(router = %router.name, %username, "Enabling hotspot user (simulated)");
        Ok(())
    }

    async fn disable_hotspot_user(&self, router_id: Uuid, username: &str) -> RouterResult<()> {
        let router = self.active_router(router_id).await?;
        info!(router = %router.name, %username, "Disabling hotspot user (simulated)");
        Ok(())
    }

    async fn delete_hotspot_user(&self, router_id: Uuid, username: &str) -> RouterResult<()> {
        let router = self.active_router(router_id).await?;
        info!(router = %router.name, %username, "Deleting hotspot user (simulated)");
        Ok(())
    }

    async fn active_sessions(&self, router_id: Uuid) -> RouterResult<Vec<ActiveSession>> {
        let router = self.active_router(router_id).await?;
        debug!(router = %router.name, "Listing active sessions (simulated)");
        Ok(Vec::new())
    }

    async fn disconnect_session(&self, router_id: Uuid, session_id: &str) -> RouterResult<()> {
        let router = self.active_router(router_id).await?;
        info!(router = %router.name, %session_id, "Disconnecting session (simulated)");
        Ok(())
    }

    async fn create_user_profile(
        &self,
        router_id: Uuid,
        name: &str,
        speed_mbps: i32,
    ) -> RouterResult<()> {
        let router = self.active_router(router_id).await?;
        info!(
            router = %router.name,
            profile = %name,
            rate_limit = %format!("{speed_mbps}M/{speed_mbps}M"),
            "Creating user profile (simulated)"
        );
        Ok(())
    }

    async fn test_connection(&self, router: &Router) -> RouterResult<bool> {
        debug!(
            router_id = %router.id,
            host = %router.host,
            port = router.port,
            "Testing router connection (simulated)"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StoreRegistry, profile_name};
    use be_remote_db::{HotspotStore, MemoryStore, NewRouter, RouterUpdate};

    async fn client_with_router() -> (SimulatedRouterClient, Arc<MemoryStore>, Router) {
        let store = Arc::new(MemoryStore::new());
        let router = store
            .create_router(NewRouter {
                name: "Lobby".into(),
                host: "192.168.88.1".into(),
                port: 8728,
                username: "api".into(),
                password: "secret".into(),
                is_active: true,
            })
            .await
            .unwrap();
        let registry = Arc::new(StoreRegistry::new(store.clone()));
        (SimulatedRouterClient::new(registry), store, router)
    }

    fn credential() -> HotspotCredential {
        HotspotCredential {
            username: "user_AABBCCDDEEFF".into(),
            password: "s3cretpw".into(),
            mac_address: "AA:BB:CC:DD:EE:FF".into(),
            profile: profile_name(10),
        }
    }

    #[tokio::test]
    async fn provisions_on_registered_router() {
        let (client, _store, router) = client_with_router().await;

        assert!(client.connect(&router).await.unwrap());
        client
            .create_hotspot_user(router.id, &credential())
            .await
            .unwrap();
        client
            .enable_hotspot_user(router.id, "user_AABBCCDDEEFF")
            .await
            .unwrap();
        assert!(client.active_sessions(router.id).await.unwrap().is_empty());
        assert!(client.test_connection(&router).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_router_is_not_found() {
        let (client, _store, _router) = client_with_router().await;
        let missing = Uuid::now_v7();

        let err = client
            .create_hotspot_user(missing, &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NotFound(id) if id == missing));

        let err = client.active_sessions(missing).await.unwrap_err();
        assert!(matches!(err, RouterError::NotFound(_)));
    }

    #[tokio::test]
    async fn deactivated_router_is_rejected() {
        let (client, store, router) = client_with_router().await;
        store
            .update_router(
                router.id,
                RouterUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = client
            .disable_hotspot_user(router.id, "user_AABBCCDDEEFF")
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Inactive(_)));
    }
}
