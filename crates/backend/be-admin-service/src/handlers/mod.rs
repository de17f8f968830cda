use uuid::Uuid;

use crate::error::AdminError;

pub mod plans;
pub mod routers;
pub mod stats;
pub mod transactions;
pub mod users;

/// Path ids that are not UUIDs cannot exist in any table.
pub(crate) fn parse_id(raw: &str, entity: &'static str) -> Result<Uuid, AdminError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AdminError::NotFound(entity))
}
