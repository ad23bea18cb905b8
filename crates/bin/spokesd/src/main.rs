//! # spokesd — spokes bridge daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Construct the hub gateway and the enabled bridge variants
//! - Build the axum router, injecting the bridge registry
//! - Announce this server to the hub with a fresh token
//! - Bind to a TCP port and serve until SIGINT/SIGTERM
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use spokes_adapter_generic::GenericBridge;
use spokes_adapter_http_axum::router;
use spokes_adapter_http_axum::state::AppState;
use spokes_adapter_hub_tcp::TcpHubGateway;
use spokes_adapter_iqsign::IqsignBridge;
use spokes_adapter_smartthings::SmartThingsBridge;
use spokes_app::services::{BridgeRegistry, HubService};
use spokes_domain::id::new_secret;
use spokes_domain::schema::SchemaNormalizer;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

type Gateway = TcpHubGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let gateway = TcpHubGateway::new(config.hub.clone());
    let mut registry = BridgeRegistry::<
        Arc<GenericBridge<Gateway>>,
        SmartThingsBridge<Gateway>,
        IqsignBridge<Gateway>,
    >::new();

    let mut pull = None;
    if config.bridges.generic {
        let generic = Arc::new(GenericBridge::new(gateway.clone()));
        registry = registry.with_generic(Arc::clone(&generic));
        pull = Some(generic);
    }
    if config.bridges.smartthings {
        let smartthings = SmartThingsBridge::new(
            config.smartthings.clone(),
            SchemaNormalizer::new(config.schema.max_depth),
            gateway.clone(),
        );
        if smartthings.spawn_refresh().is_some() {
            tracing::info!(
                every_secs = config.smartthings.refresh_interval_secs,
                "SmartThings value refresh enabled"
            );
        }
        registry = registry.with_smartthings(smartthings);
    }
    if config.bridges.iqsign {
        registry = registry.with_iqsign(IqsignBridge::new(
            config.iqsign.clone(),
            SchemaNormalizer::new(config.schema.max_depth),
            gateway.clone(),
        ));
    }
    tracing::info!(bridges = ?registry.enabled(), "bridges enabled");

    let hub = HubService::new(gateway, "spokes");
    let state = AppState::new(hub, new_secret(), registry);

    let announce = state.clone();
    tokio::spawn(async move {
        if announce.hub.initialize(&announce.hub_auth).await.is_some() {
            tracing::info!("announced to hub");
        }
    });

    let app = router::build(state, pull);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(%bind_addr, "spokesd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("spokesd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested");
}
