use std::sync::Arc;

use be_remote_db::HotspotStore;
use be_router_service::RouterController;
use tracing::info;

use crate::{
    config::{GatewayKind, MpesaConfig},
    error::PaymentError,
    gateway::{FakeGateway, MpesaClient, PaymentGateway},
};

pub struct AppState {
    pub store: Arc<dyn HotspotStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub routers: Arc<dyn RouterController>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn HotspotStore>,
        gateway: Arc<dyn PaymentGateway>,
        routers: Arc<dyn RouterController>,
    ) -> Self {
        Self {
            store,
            gateway,
            routers,
        }
    }
}

/// Builds the gateway selected by `PAYMENT_GATEWAY`.
pub fn gateway_from_env() -> Result<Arc<dyn PaymentGateway>, PaymentError> {
    match GatewayKind::from_env()? {
        GatewayKind::Mpesa => {
            let config = MpesaConfig::from_env()?;
            info!(environment = ?config.environment, "Using M-Pesa payment gateway");
            Ok(Arc::new(MpesaClient::new(config)?))
        }
        GatewayKind::Fake => {
            info!("Using fake payment gateway");
            Ok(Arc::new(FakeGateway::new()))
        }
    }
}
