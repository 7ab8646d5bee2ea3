mod base;
mod peer;
mod seed;

use std::borrow::Cow;

use axum::{
    error_handling::HandleErrorLayer, http::StatusCode, response::IntoResponse, routing, Router,
};
use tokio::time::Duration;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

pub mod paths;

use crate::node::{self, PeerHandle, SeedHandle};

/// Status API for whichever role this node runs
pub fn api(node: &node::NodeWrapper) -> Router {
    match node {
        node::NodeWrapper::Seed(seed) => seed_api(seed.handle.clone()),
        node::NodeWrapper::Peer(peer) => peer_api(peer.handle.clone()),
    }
}

pub fn seed_api(handle: SeedHandle) -> Router {
    Router::new()
        .route(paths::base::ROOT, routing::get(base::root))
        .route(paths::base::HEALTH, routing::get(base::health))
        .route(paths::base::ABOUT, routing::get(seed::about))
        .route(paths::base::STATUS, routing::get(seed::status))
        .route(paths::seed::PEERS, routing::get(seed::list_peers))
        .layer(
            ServiceBuilder::new()
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .timeout(Duration::from_secs(10)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(handle)
}

pub fn peer_api(handle: PeerHandle) -> Router {
    Router::new()
        .route(paths::base::ROOT, routing::get(base::root))
        .route(paths::base::HEALTH, routing::get(base::health))
        .route(paths::base::ABOUT, routing::get(peer::about))
        .route(paths::base::STATUS, routing::get(peer::status))
        .route(paths::peer::MEMBERSHIP, routing::get(peer::membership))
        .route(paths::peer::GOSSIP, routing::post(peer::publish))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .timeout(Duration::from_secs(10)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(handle)
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Cow::from("service is overloaded, try again later"),
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Cow::from(format!("Unhandled internal error: {}", error)),
    )
}
