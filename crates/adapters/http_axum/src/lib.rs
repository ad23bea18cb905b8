//! # spokes-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the hub-facing endpoints under `/hub` and dispatch them to the
//!   bridge variant named in the request
//! - Serve the pull-device protocol under `/generic` (seed/token handshake,
//!   bearer-authenticated device list, poll and event posts)
//! - Map [`BridgeError`](spokes_domain::error::BridgeError) into the
//!   `{status, reason}` bodies both peers expect
//!
//! ## Dependency rule
//! Depends on `spokes-app` (for port traits and services) and `spokes-domain`
//! (for wire types). Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
