use std::sync::Arc;

use be_payment_service::PaymentGateway;
use be_remote_db::HotspotStore;
use be_router_service::RouterController;

pub struct AdminState {
    pub store: Arc<dyn HotspotStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub routers: Arc<dyn RouterController>,
}
