//! Application services shared by every bridge adapter.
//!
//! Each service accepts port implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod bridge_registry;
pub mod hub_service;

pub use bridge_registry::{BridgeKind, BridgeRegistry};
pub use hub_service::{HubService, RouteOutcome};
