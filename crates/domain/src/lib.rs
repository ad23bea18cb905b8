//! # spokes-domain
//!
//! Pure domain model for the spokes bridge server.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the **canonical device model** (devices, parameters, transitions)
//!   every bridge adapter produces for the hub
//! - Normalize vendor capability schemas into that model
//! - Define the **hub wire messages** (`DEVICES`, `EVENT`, `INITIALIZE`)
//! - Define the **active sensor set** that filters parameter events
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod message;
pub mod schema;
pub mod sensor;
