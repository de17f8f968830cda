pub mod db;
pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod store;
pub mod types;

pub use db::DatabaseManager;
pub use error::{DbError, DbResult};
#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryStore;
pub use store::HotspotStore;
pub use types::*;
