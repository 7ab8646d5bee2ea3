use axum::extract::State;
use tracing::instrument;

use super::base::AboutResponse;
use crate::error::Result;
use crate::node::seed::{SeedHandle, SeedStatus};
use crate::node::NodeAddress;

/// Peers currently registered with this seed
#[instrument(skip(state), level = "debug")]
pub async fn list_peers(State(state): State<SeedHandle>) -> Result<axum::Json<Vec<NodeAddress>>> {
    state.peers().await.map(axum::Json)
}

#[instrument(skip(state), level = "debug")]
pub async fn status(State(state): State<SeedHandle>) -> Result<axum::Json<SeedStatus>> {
    state.status().await.map(axum::Json)
}

#[instrument(skip(state), level = "debug")]
pub async fn about(State(state): State<SeedHandle>) -> axum::Json<AboutResponse> {
    axum::Json(AboutResponse::new("seed", state.address()))
}
