use std::sync::Arc;

use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use rendezvous_protocol::Encoding;
use serde::Deserialize;

use crate::one_to_one;
use crate::relay::Relay;

#[derive(Debug, Default, Clone)]
pub struct ServerState {
    relay: Arc<Relay>,
}

impl ServerState {
    #[must_use]
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }

    #[must_use]
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }
}

/// Query parameters accepted when opening the signaling websocket.
#[derive(Debug, Default, Deserialize)]
struct ConnectParams {
    #[serde(default)]
    encoding: Encoding,
}

#[allow(clippy::unused_async)]
async fn health_handler() -> &'static str {
    "OK"
}

#[allow(clippy::unused_async)]
async fn one_to_one_handler(
    State(state): State<ServerState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| one_to_one::user_connected(socket, state.relay, params.encoding))
}

pub fn create(server_state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/one-to-one", get(one_to_one_handler))
        .with_state(server_state)
}
