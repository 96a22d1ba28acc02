use crate::bus::BusEvent;
use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Client → Server frame: `{type, data}`
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "type")]
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Server → Client frame: `{type, data?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ServerFrame {
    pub fn new(frame_type: impl Into<String>, data: Value) -> Self {
        Self {
            frame_type: frame_type.into(),
            data,
        }
    }

    /// Reply with no payload
    pub fn ack(frame_type: impl Into<String>) -> Self {
        Self::new(frame_type, Value::Null)
    }

    /// `{type:"error", data:{code, message}}`
    pub fn error(err: &GatewayError) -> Self {
        Self::new(
            "error",
            json!({
                "code": err.code(),
                "message": err.message(),
            }),
        )
    }
}

/// Bus messages carry `{topic, payload}`; anything else is forwarded under
/// the channel's event type
impl From<BusEvent> for ServerFrame {
    fn from(event: BusEvent) -> Self {
        match event.data {
            Value::Object(mut message) if message.contains_key("topic") => {
                let topic = match message.remove("topic") {
                    Some(Value::String(topic)) => topic,
                    Some(other) => other.to_string(),
                    None => event.event_type,
                };
                let payload = message.remove("payload").unwrap_or(Value::Null);
                Self::new(topic, payload)
            }
            data => Self::new(event.event_type, data),
        }
    }
}
