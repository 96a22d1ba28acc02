use super::connection::ConnectionHandler;
use super::dispatcher::Dispatcher;
use crate::alias::AliasResolver;
use crate::bus::{BusConfig, BusGateway, JobTransport, MessageTransport};
use crate::service::DeviceService;
use crate::session::SessionStore;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Shared application state for WebSocket handler
#[derive(Clone)]
pub struct WsAppState {
    pub sessions: Arc<SessionStore>,
    pub jobs: Arc<dyn JobTransport>,
    pub messages: Arc<dyn MessageTransport>,
    pub aliases: AliasResolver,
    pub bus_config: BusConfig,
}

/// GET /ws - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsAppState>>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Each connection gets its own bus client and session slot
async fn handle_socket(socket: WebSocket, state: Arc<WsAppState>) {
    let connection_id = Uuid::new_v4().to_string();

    let bus = Arc::new(BusGateway::new(
        Arc::clone(&state.jobs),
        Arc::clone(&state.messages),
        state.aliases.clone(),
        &state.bus_config,
    ));
    let service = DeviceService::new(Arc::clone(&state.sessions), Arc::clone(&bus));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(connection_id.clone(), service, events_tx);

    ConnectionHandler::new(dispatcher).handle(socket, events_rx).await;

    // In-flight jobs finish on their own; only the channel readers stop
    bus.close();
    state.sessions.remove(&connection_id);
}
