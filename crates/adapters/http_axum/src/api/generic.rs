//! Pull-device protocol handlers.
//!
//! `attach` and `authorize` are open; every other route requires the
//! bearer token handed out by `authorize`.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Deserialize;

use spokes_app::ports::{PingReply, PullBridge};
use spokes_domain::device::Device;
use spokes_domain::error::BridgeError;
use spokes_domain::id::UserId;
use spokes_domain::message::ParameterEvent;

use crate::api::OkReply;
use crate::error::{ApiError, ErrorBody};

/// Build the `/generic` sub-router.
pub fn routes<P>() -> Router<Arc<P>>
where
    P: PullBridge + 'static,
{
    Router::new()
        .route("/attach", post(attach::<P>))
        .route("/authorize", post(authorize::<P>))
        .route("/devices", post(devices::<P>))
        .route("/ping", post(ping::<P>))
        .route("/event", post(event::<P>))
}

#[derive(Debug, Deserialize)]
pub struct AttachRequest {
    pub uid: UserId,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub uid: UserId,
    pub patencoded: String,
}

#[derive(Debug, Deserialize)]
pub struct DevicesRequest {
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub event: ParameterEvent,
}

/// Handshake failure, sent with 403.
pub struct Forbidden(&'static str);

impl IntoResponse for Forbidden {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, Json(ErrorBody::new(self.0))).into_response()
    }
}

/// The user a request's bearer token belongs to.
pub struct Caller(pub UserId);

impl<P: PullBridge + 'static> FromRequestParts<Arc<P>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, pull: &Arc<P>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(BridgeError::Unauthorized)?;
        Ok(Self(pull.authenticate(token.trim())?))
    }
}

/// `POST /generic/attach`
pub async fn attach<P: PullBridge + 'static>(
    State(pull): State<Arc<P>>,
    Json(req): Json<AttachRequest>,
) -> Result<OkReply, Forbidden> {
    match pull.attach(&req.uid) {
        Ok(seed) => Ok(OkReply::empty().with("seed", seed)),
        Err(err) => {
            tracing::debug!(uid = %req.uid, error = %err, "attach refused");
            Err(Forbidden("No such user"))
        }
    }
}

/// `POST /generic/authorize`
pub async fn authorize<P: PullBridge + 'static>(
    State(pull): State<Arc<P>>,
    Json(req): Json<AuthorizeRequest>,
) -> Result<OkReply, Forbidden> {
    match pull.authorize(&req.uid, &req.patencoded) {
        Ok(token) => Ok(OkReply::empty().with("token", token)),
        Err(BridgeError::NotFound(_)) => Err(Forbidden("No such user")),
        Err(err) => {
            tracing::debug!(uid = %req.uid, error = %err, "authorize refused");
            Err(Forbidden("Bad uid or password"))
        }
    }
}

/// `POST /generic/devices`
pub async fn devices<P: PullBridge + 'static>(
    State(pull): State<Arc<P>>,
    Caller(uid): Caller,
    Json(req): Json<DevicesRequest>,
) -> Result<OkReply, ApiError> {
    pull.receive_devices(uid, req.devices).await?;
    Ok(OkReply::empty())
}

/// `POST /generic/ping`
pub async fn ping<P: PullBridge + 'static>(
    State(pull): State<Arc<P>>,
    Caller(uid): Caller,
) -> Result<Json<PingReply>, ApiError> {
    Ok(Json(pull.ping(&uid)?))
}

/// `POST /generic/event`
pub async fn event<P: PullBridge + 'static>(
    State(pull): State<Arc<P>>,
    Caller(uid): Caller,
    Json(req): Json<EventRequest>,
) -> Result<OkReply, ApiError> {
    let outcome = pull.receive_event(uid, req.event).await?;
    tracing::debug!(?outcome, "event routed");
    Ok(OkReply::empty())
}
