use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use tracing::{event, instrument, Level};

use super::base::AboutResponse;
use crate::api_error;
use crate::error::Result;
use crate::node::messages::GossipId;
use crate::node::peer::{MembershipSnapshot, PeerHandle, PeerNodeStatus};
use crate::transport::MAX_FRAME_BYTES;

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub timestamp: i64,
    pub origin: String,
}

impl From<GossipId> for PublishResponse {
    fn from(id: GossipId) -> Self {
        Self {
            timestamp: id.timestamp,
            origin: id.origin.to_string(),
        }
    }
}

#[instrument(skip(state), level = "debug")]
pub async fn about(State(state): State<PeerHandle>) -> axum::Json<AboutResponse> {
    axum::Json(AboutResponse::new("peer", state.address()))
}

#[instrument(skip(state), level = "debug")]
pub async fn membership(State(state): State<PeerHandle>) -> Result<axum::Json<MembershipSnapshot>> {
    state.snapshot().await.map(axum::Json)
}

#[instrument(skip(state), level = "debug")]
pub async fn status(State(state): State<PeerHandle>) -> Result<axum::Json<PeerNodeStatus>> {
    state.status().await.map(axum::Json)
}

/// Originate a gossip message; the request body, if any, is its content
#[instrument(skip(state, body), level = "debug")]
pub async fn publish(
    State(state): State<PeerHandle>,
    body: String,
) -> Result<(StatusCode, axum::Json<PublishResponse>)> {
    let content = body.trim();
    if content.contains('\n') || content.contains('\r') {
        return Err(api_error!("Gossip content must be a single line"));
    }
    // leave room for the header fields
    if content.len() > MAX_FRAME_BYTES / 2 {
        return Err(api_error!("Gossip content exceeds {} bytes", MAX_FRAME_BYTES / 2));
    }
    let content = (!content.is_empty()).then(|| content.to_string());

    let id = state.publish(content).await?;
    event!(Level::INFO, message = "Published gossip", origin = %id.origin, timestamp = id.timestamp);
    Ok((StatusCode::CREATED, axum::Json(id.into())))
}
