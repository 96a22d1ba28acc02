use crate::alias::AliasResolver;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One hop in a message's delivery route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteHop {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub hop_type: String,
}

#[derive(Debug, Default, Deserialize)]
struct FrameMetadata {
    #[serde(default)]
    route: Vec<RouteHop>,
}

/// Wire shape of a pub/sub frame: `{metadata:{route}, rawData}`
#[derive(Debug, Deserialize)]
struct IncomingFrame {
    #[serde(default)]
    metadata: FrameMetadata,
    #[serde(rename = "rawData", default)]
    raw_data: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

/// Message delivered to a channel listener
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusEvent {
    pub event_type: String,
    pub route: Vec<RouteHop>,
    pub data: Value,
}

/// Decode a raw channel payload.
///
/// `rawData` is JSON-decoded when possible and kept as a string otherwise; a
/// payload that is not a frame at all is delivered as a string.
pub fn decode(event_type: &str, payload: &[u8]) -> BusEvent {
    let frame: IncomingFrame = match serde_json::from_slice(payload) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, event_type = %event_type, "Undecodable bus frame, passing raw payload");
            return BusEvent {
                event_type: event_type.to_string(),
                route: Vec::new(),
                data: Value::String(String::from_utf8_lossy(payload).into_owned()),
            };
        }
    };

    let data = match (frame.raw_data, frame.data) {
        (Some(Value::String(raw)), _) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        (Some(other), _) => other,
        (None, Some(data)) => data,
        (None, None) => Value::Null,
    };

    BusEvent {
        event_type: event_type.to_string(),
        route: frame.metadata.route,
        data,
    }
}

/// Replace route UUIDs with their first alias. Unresolved UUIDs stay as-is.
pub async fn resolve_route(aliases: &AliasResolver, route: &mut [RouteHop]) {
    for hop in route.iter_mut() {
        hop.from = alias_or_uuid(aliases, &hop.from).await;
        hop.to = alias_or_uuid(aliases, &hop.to).await;
    }
}

async fn alias_or_uuid(aliases: &AliasResolver, uuid: &str) -> String {
    match aliases.reverse_lookup(uuid).await {
        Ok(names) => names.into_iter().next().unwrap_or_else(|| uuid.to_string()),
        Err(e) => {
            warn!(uuid = %uuid, error = %e, "Reverse alias lookup failed");
            uuid.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_raw_data() {
        let payload = json!({
            "metadata": {"route": [{"from": "a", "to": "b", "type": "message.sent"}]},
            "rawData": "{\"topic\":\"data\",\"payload\":{\"sensorId\":1,\"value\":true}}"
        });
        let event = decode("message", payload.to_string().as_bytes());

        assert_eq!(event.event_type, "message");
        assert_eq!(event.route.len(), 1);
        assert_eq!(event.route[0].hop_type, "message.sent");
        assert_eq!(event.data["topic"], "data");
        assert_eq!(event.data["payload"]["value"], true);
    }

    #[test]
    fn test_decode_falls_back_to_raw_string() {
        let payload = json!({"metadata": {"route": []}, "rawData": "not json {"});
        let event = decode("message", payload.to_string().as_bytes());
        assert_eq!(event.data, json!("not json {"));
    }

    #[test]
    fn test_decode_non_frame_payload() {
        let event = decode("message", b"hello");
        assert!(event.route.is_empty());
        assert_eq!(event.data, json!("hello"));
    }

    #[test]
    fn test_decode_without_raw_data_uses_data() {
        let payload = json!({"data": {"x": 1}});
        let event = decode("broadcast", payload.to_string().as_bytes());
        assert_eq!(event.data, json!({"x": 1}));
        assert!(event.route.is_empty());
    }
}
