//! Hub gateway port — the only way messages reach the hub.

use std::future::Future;

use serde_json::Value;
use spokes_domain::message::HubMessage;

/// Delivers one message to the hub and returns its parsed reply.
///
/// Each call is independent: no pooling, no retry. Any failure (connect,
/// timeout, malformed reply) yields `None`; callers log it and carry on.
pub trait HubGateway: Send + Sync {
    fn send(&self, message: HubMessage) -> impl Future<Output = Option<Value>> + Send;
}

impl<T: HubGateway> HubGateway for std::sync::Arc<T> {
    fn send(&self, message: HubMessage) -> impl Future<Output = Option<Value>> + Send {
        (**self).send(message)
    }
}
