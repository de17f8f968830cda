use std::sync::Arc;

use async_trait::async_trait;
use be_remote_db::{HotspotStore, Router};
use uuid::Uuid;

use crate::error::{RouterError, RouterResult};

/// Source of truth for which routers exist and whether they are active.
#[async_trait]
pub trait RouterRegistry: Send + Sync {
    async fn lookup(&self, router_id: Uuid) -> RouterResult<Router>;
}

/// Registry backed by the `mikrotik_routers` table.
#[derive(Clone)]
pub struct StoreRegistry {
    store: Arc<dyn HotspotStore>,
}

impl StoreRegistry {
    pub fn new(store: Arc<dyn HotspotStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RouterRegistry for StoreRegistry {
    async fn lookup(&self, router_id: Uuid) -> RouterResult<Router> {
        match self.store.get_router(router_id).await {
            Ok(router) => Ok(router),
            Err(err) if err.is_not_found() => Err(RouterError::NotFound(router_id)),
            Err(err) => Err(err.into()),
        }
    }
}
