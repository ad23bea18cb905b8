//! # spokes-app
//!
//! Application layer — bridge ports (traits) and the services every bridge
//! adapter shares.
//!
//! ## Responsibilities
//! - Define **port traits** adapters implement or depend on:
//!   - `BridgeAdapter` — the capability interface of one bridge variant
//!   - `PullBridge` — the handshake and polling protocol of pull devices
//!   - `HubGateway` — one-shot delivery of a message to the hub
//! - Hold **per-adapter user state** (`UserStore`) without globals
//! - Wrap hub traffic (`HubService`): device pushes, filtered events,
//!   the `INITIALIZE` announcement
//! - Dispatch hub requests to the right variant by bridge name
//!   (`BridgeRegistry`)
//!
//! ## Dependency rule
//! Depends on `spokes-domain` only. Never imports adapter crates. Adapters
//! depend on *this* crate, not the reverse.

pub mod ports;
pub mod services;
pub mod user_store;
