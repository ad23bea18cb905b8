//! Axum router assembly.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use spokes_app::ports::{BridgeAdapter, HubGateway, PullBridge};

use crate::error::ErrorBody;
use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Hub routes live under `/hub`; the pull-device protocol is mounted under
/// `/generic` only when a pull bridge is supplied. Includes a
/// [`TraceLayer`] that logs each HTTP request/response at the `DEBUG`
/// level using the `tracing` ecosystem.
pub fn build<H, G, S, I, P>(state: AppState<H, G, S, I>, pull: Option<Arc<P>>) -> Router
where
    H: HubGateway + 'static,
    G: BridgeAdapter + 'static,
    S: BridgeAdapter + 'static,
    I: BridgeAdapter + 'static,
    P: PullBridge + 'static,
{
    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest("/hub", crate::api::hub::routes());
    if let Some(pull) = pull {
        router = router.nest("/generic", crate::api::generic::routes().with_state(pull));
    }
    router
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Invalid URL")))
}
