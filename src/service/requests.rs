use crate::error::{GatewayError, Result};
use crate::schema::SensorValue;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Decode an event's `data` into its request type; shape errors are the
/// client's fault
pub fn parse<T: DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| GatewayError::bad_request(format!("Invalid data: {}", e)))
}

/// `identity`: authenticate with an alias or a uuid
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    pub token: String,
}

impl IdentityRequest {
    pub fn device_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.uuid.as_deref())
    }
}

/// Requests that only name a target device
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceIdRequest {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMetadataRequest {
    pub id: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicesRequest {
    #[serde(default)]
    pub query: Option<Map<String, Value>>,
}

/// `schema`: kept raw so every violation can be reported
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaRequest {
    pub schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevokeTokenRequest {
    pub id: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDataRequest {
    pub id: String,
    pub sensor_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetDataRequest {
    pub id: String,
    pub data: Vec<SensorValue>,
}
