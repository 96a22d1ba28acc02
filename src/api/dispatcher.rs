use super::protocol::{ClientFrame, ServerFrame};
use crate::bus::BusEvent;
use crate::device::RegisterRequest;
use crate::error::{GatewayError, Result};
use crate::schema::SensorValue;
use crate::service::requests::{self, IdentityRequest};
use crate::service::DeviceService;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Routes one connection's inbound events to [`DeviceService`] and renders
/// every outcome, errors included, as a [`ServerFrame`]
pub struct Dispatcher {
    connection_id: String,
    service: DeviceService,
    /// Bus messages for this connection's socket
    events_tx: mpsc::UnboundedSender<BusEvent>,
}

impl Dispatcher {
    pub fn new(
        connection_id: impl Into<String>,
        service: DeviceService,
        events_tx: mpsc::UnboundedSender<BusEvent>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            service,
            events_tx,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Handle one text frame from the client
    pub async fn dispatch(&self, text: &str) -> ServerFrame {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                let err = GatewayError::bad_request(format!("Invalid frame: {}", e));
                error!(connection_id = %self.connection_id, code = err.code(), "{}", err);
                return ServerFrame::error(&err);
            }
        };

        info!(connection_id = %self.connection_id, event = %frame.event, "Handling client event");

        match self.handle(&frame.event, frame.data).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(
                    connection_id = %self.connection_id,
                    event = %frame.event,
                    code = err.code(),
                    "Failed handling '{}' ({}): {}",
                    frame.event,
                    err.code(),
                    err
                );
                ServerFrame::error(&err)
            }
        }
    }

    async fn handle(&self, event: &str, data: Value) -> Result<ServerFrame> {
        let id = self.connection_id.as_str();
        let data = match data {
            Value::Null => Value::Object(Map::new()),
            data => data,
        };

        let reply = match event {
            "identity" => {
                self.identify(requests::parse(data)?).await?;
                ServerFrame::ack("ready")
            }
            "register" => {
                let request: RegisterRequest = requests::parse(data)?;
                let device = self.service.register(id, &request).await?;
                ServerFrame::new("registered", serde_json::to_value(device)?)
            }
            "updateMetadata" => {
                self.service
                    .update_metadata(id, &requests::parse(data)?)
                    .await?;
                ServerFrame::ack("updated")
            }
            "devices" => {
                let devices = self.service.list_devices(id, &requests::parse(data)?).await?;
                ServerFrame::new("devices", serde_json::to_value(devices)?)
            }
            "unregister" => {
                self.service.unregister(id, &requests::parse(data)?).await?;
                ServerFrame::ack("unregistered")
            }
            "schema" => {
                self.service
                    .update_schema(id, &requests::parse(data)?)
                    .await?;
                ServerFrame::ack("updated")
            }
            "token" => {
                let token = self
                    .service
                    .create_session_token(id, &requests::parse(data)?)
                    .await?;
                ServerFrame::new("created", Value::String(token))
            }
            "revokeToken" => {
                self.service
                    .revoke_session_token(id, &requests::parse(data)?)
                    .await?;
                ServerFrame::ack("revoked")
            }
            "activate" => {
                self.service.activate(id, &requests::parse(data)?).await?;
                ServerFrame::ack("activated")
            }
            "data" => {
                let reading: SensorValue = requests::parse(data)?;
                self.service.publish_data(id, &reading).await?;
                ServerFrame::ack("published")
            }
            "getData" => {
                self.service.get_data(id, &requests::parse(data)?).await?;
                ServerFrame::ack("sent")
            }
            "setData" => {
                self.service.set_data(id, &requests::parse(data)?).await?;
                ServerFrame::ack("sent")
            }
            other => {
                return Err(GatewayError::bad_request(format!(
                    "Unknown event type '{}'",
                    other
                )))
            }
        };

        Ok(reply)
    }

    /// Authenticate, then follow the device's message channel. A repeated
    /// identity replaces the previous subscription.
    async fn identify(&self, request: IdentityRequest) -> Result<()> {
        let credentials = self
            .service
            .authenticate(&self.connection_id, &request)
            .await?;

        let events_tx = self.events_tx.clone();
        self.service
            .bus()
            .switch_to(&credentials.uuid, "message", move |event| {
                // receiver gone means the socket is closing
                let _ = events_tx.send(event);
            })
            .await
            .map_err(|e| {
                warn!(
                    connection_id = %self.connection_id,
                    uuid = %credentials.uuid,
                    "Identity accepted but message channel unchanged"
                );
                e
            })
    }
}
