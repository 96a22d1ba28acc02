use super::dispatcher::Dispatcher;
use super::protocol::ServerFrame;
use crate::bus::BusEvent;
use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Drives a single WebSocket connection: client frames go through the
/// dispatcher one at a time, bus messages are forwarded as they arrive
pub struct ConnectionHandler {
    dispatcher: Dispatcher,
}

impl ConnectionHandler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(
        self,
        mut socket: WebSocket,
        mut events_rx: mpsc::UnboundedReceiver<BusEvent>,
    ) {
        let connection_id = self.dispatcher.connection_id().to_string();
        info!(connection_id = %connection_id, "WebSocket connection established");

        loop {
            tokio::select! {
                Some(msg) = socket.recv() => {
                    match msg {
                        Ok(Message::Text(text)) => {
                            let reply = self.dispatcher.dispatch(&text).await;
                            if let Err(e) = send_frame(&mut socket, &reply).await {
                                error!(error = %e, "Failed to send reply");
                                break;
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            debug!(connection_id = %connection_id, close = ?frame, "Close frame received");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Ok(_) => {
                            // Ignore binary, pong messages
                        }
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                Some(event) = events_rx.recv() => {
                    let frame = ServerFrame::from(event);
                    if let Err(e) = send_frame(&mut socket, &frame).await {
                        error!(error = %e, "Failed to forward bus message");
                        break;
                    }
                }

                else => {
                    break;
                }
            }
        }

        info!(connection_id = %connection_id, "WebSocket connection closed");
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> anyhow::Result<()> {
    let json = serde_json::to_string(frame)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
