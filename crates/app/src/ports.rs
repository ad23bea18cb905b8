//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the service layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod bridge;
pub mod hub;

pub use bridge::{AuthData, BridgeAdapter, PingReply, PullBridge, TokenAuth};
pub use hub::HubGateway;
