//! Shared application state for axum handlers.

use std::sync::Arc;

use spokes_app::ports::{BridgeAdapter, HubGateway};
use spokes_app::services::{BridgeRegistry, HubService};

/// State of the hub-facing routes.
///
/// Generic over the hub gateway and the three bridge variants to avoid
/// dynamic dispatch. `Clone` is implemented manually so only the `Arc`
/// wrappers are cloned.
pub struct AppState<H, G, S, I> {
    /// Used to re-announce this server on `hub/setup`.
    pub hub: Arc<HubService<H>>,
    /// Token sent with every `INITIALIZE`.
    pub hub_auth: Arc<str>,
    pub registry: Arc<BridgeRegistry<G, S, I>>,
}

impl<H, G, S, I> Clone for AppState<H, G, S, I> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            hub_auth: Arc::clone(&self.hub_auth),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<H, G, S, I> AppState<H, G, S, I>
where
    H: HubGateway + 'static,
    G: BridgeAdapter + 'static,
    S: BridgeAdapter + 'static,
    I: BridgeAdapter + 'static,
{
    pub fn new(
        hub: HubService<H>,
        hub_auth: impl Into<Arc<str>>,
        registry: BridgeRegistry<G, S, I>,
    ) -> Self {
        Self {
            hub: Arc::new(hub),
            hub_auth: hub_auth.into(),
            registry: Arc::new(registry),
        }
    }
}
