//! Hub-facing handlers. Every request names the bridge variant it targets.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Deserialize;
use serde_json::Value;

use spokes_app::ports::{AuthData, BridgeAdapter, HubGateway};
use spokes_app::services::BridgeKind;
use spokes_domain::id::{BridgeId, DeviceUid, UserId};
use spokes_domain::message::DeviceCommand;
use spokes_domain::sensor::ActiveSensor;

use crate::api::OkReply;
use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;

/// Build the `/hub` sub-router.
pub fn routes<H, G, S, I>() -> Router<AppState<H, G, S, I>>
where
    H: HubGateway + 'static,
    G: BridgeAdapter + 'static,
    S: BridgeAdapter + 'static,
    I: BridgeAdapter + 'static,
{
    Router::new()
        .route("/setup", post(setup::<H, G, S, I>))
        .route("/addbridge", post(add_bridge::<H, G, S, I>))
        .route("/devices", post(devices::<H, G, S, I>))
        .route("/command", post(command::<H, G, S, I>))
        .route("/parameters", post(parameters::<H, G, S, I>))
        .route("/activesensors", post(active_sensors::<H, G, S, I>))
}

#[derive(Debug, Deserialize)]
pub struct AddBridgeRequest {
    pub bridge: String,
    pub bridgeid: BridgeId,
    #[serde(default)]
    pub authdata: AuthData,
}

#[derive(Debug, Deserialize)]
pub struct DevicesRequest {
    pub bridge: String,
    pub uid: UserId,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub bridge: String,
    pub bridgeid: BridgeId,
    pub uid: UserId,
    pub deviceid: DeviceUid,
    pub command: String,
    #[serde(default)]
    pub values: Value,
}

#[derive(Debug, Deserialize)]
pub struct ParametersRequest {
    pub bridge: String,
    pub bridgeid: BridgeId,
    pub uid: UserId,
    pub deviceid: DeviceUid,
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveSensorsRequest {
    pub bridge: String,
    pub bridgeid: BridgeId,
    pub uid: UserId,
    #[serde(default)]
    pub active: Vec<ActiveSensor>,
}

/// Possible responses from the add-bridge endpoint.
pub enum AddBridgeResponse {
    Added,
    Rejected,
}

impl IntoResponse for AddBridgeResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Added => OkReply::empty().into_response(),
            Self::Rejected => Json(ErrorBody::new("Bad authentication")).into_response(),
        }
    }
}

/// `POST /hub/setup`
///
/// Replies at once; `INITIALIZE` goes out in the background so a hub that
/// waits on this reply is not asked to answer a second connection first.
pub async fn setup<H, G, S, I>(State(state): State<AppState<H, G, S, I>>) -> OkReply
where
    H: HubGateway + 'static,
    G: BridgeAdapter + 'static,
    S: BridgeAdapter + 'static,
    I: BridgeAdapter + 'static,
{
    let hub = Arc::clone(&state.hub);
    let auth = Arc::clone(&state.hub_auth);
    tokio::spawn(async move {
        hub.initialize(&auth).await;
    });
    OkReply::empty()
}

/// `POST /hub/addbridge`
pub async fn add_bridge<H, G, S, I>(
    State(state): State<AppState<H, G, S, I>>,
    Json(req): Json<AddBridgeRequest>,
) -> Result<AddBridgeResponse, ApiError>
where
    H: HubGateway + 'static,
    G: BridgeAdapter + 'static,
    S: BridgeAdapter + 'static,
    I: BridgeAdapter + 'static,
{
    let kind: BridgeKind = req.bridge.parse()?;
    let added = state
        .registry
        .add_bridge(kind, req.authdata, req.bridgeid)
        .await?;
    Ok(if added {
        AddBridgeResponse::Added
    } else {
        AddBridgeResponse::Rejected
    })
}

/// `POST /hub/devices`
pub async fn devices<H, G, S, I>(
    State(state): State<AppState<H, G, S, I>>,
    Json(req): Json<DevicesRequest>,
) -> Result<OkReply, ApiError>
where
    H: HubGateway + 'static,
    G: BridgeAdapter + 'static,
    S: BridgeAdapter + 'static,
    I: BridgeAdapter + 'static,
{
    let kind: BridgeKind = req.bridge.parse()?;
    state.registry.get_devices(kind, req.uid).await?;
    Ok(OkReply::empty())
}

/// `POST /hub/command`
pub async fn command<H, G, S, I>(
    State(state): State<AppState<H, G, S, I>>,
    Json(req): Json<CommandRequest>,
) -> Result<OkReply, ApiError>
where
    H: HubGateway + 'static,
    G: BridgeAdapter + 'static,
    S: BridgeAdapter + 'static,
    I: BridgeAdapter + 'static,
{
    let kind: BridgeKind = req.bridge.parse()?;
    let command = DeviceCommand {
        device: req.deviceid,
        command: req.command,
        values: req.values,
    };
    let reply = state
        .registry
        .handle_command(kind, req.bridgeid, req.uid, command)
        .await?;
    Ok(OkReply::empty().merge(reply))
}

/// `POST /hub/parameters`
pub async fn parameters<H, G, S, I>(
    State(state): State<AppState<H, G, S, I>>,
    Json(req): Json<ParametersRequest>,
) -> Result<OkReply, ApiError>
where
    H: HubGateway + 'static,
    G: BridgeAdapter + 'static,
    S: BridgeAdapter + 'static,
    I: BridgeAdapter + 'static,
{
    let kind: BridgeKind = req.bridge.parse()?;
    let values = state
        .registry
        .handle_parameters(kind, req.bridgeid, req.uid, req.deviceid, req.parameters)
        .await?;
    Ok(OkReply::empty().with("values", values))
}

/// `POST /hub/activesensors`
pub async fn active_sensors<H, G, S, I>(
    State(state): State<AppState<H, G, S, I>>,
    Json(req): Json<ActiveSensorsRequest>,
) -> Result<OkReply, ApiError>
where
    H: HubGateway + 'static,
    G: BridgeAdapter + 'static,
    S: BridgeAdapter + 'static,
    I: BridgeAdapter + 'static,
{
    let kind: BridgeKind = req.bridge.parse()?;
    state
        .registry
        .handle_active_sensors(kind, req.bridgeid, req.uid, req.active)
        .await?;
    Ok(OkReply::empty())
}
