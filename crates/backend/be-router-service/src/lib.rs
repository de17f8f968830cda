//! Device control for hotspot routers.
//!
//! [`RouterController`] is the provisioning seam used by the payment and
//! admin services. [`SimulatedRouterClient`] implements it without speaking
//! a device protocol: every operation is logged and returns a fixed success
//! value once the router has been resolved through the [`RouterRegistry`].

pub mod controller;
pub mod error;
pub mod registry;
pub mod simulated;

pub use controller::{ActiveSession, HotspotCredential, RouterController, profile_name};
pub use error::{RouterError, RouterResult};
pub use registry::{RouterRegistry, StoreRegistry};
pub use simulated::SimulatedRouterClient;
