//! Device model and provisioning.
//!
//! Devices live in the cloud; this module only mirrors the fields the gateway
//! reads or writes and carries everything else through untouched.

pub mod listing;
mod provisioner;
mod whitelist;

pub use listing::DeviceListing;
pub use provisioner::{DeviceProvisioner, RegisterRequest};
pub use whitelist::{Capability, Grant, Whitelists};

use crate::schema::SensorSchemaEntry;
use crate::session::Credentials;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Device role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    User,
    Gateway,
    App,
    Thing,
    Router,
}

impl DeviceType {
    /// Stored form, e.g. `knot:app`
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::User => "knot:user",
            DeviceType::Gateway => "knot:gateway",
            DeviceType::App => "knot:app",
            DeviceType::Thing => "knot:thing",
            DeviceType::Router => "knot:router",
        }
    }

    /// Client-facing form, e.g. `app`
    pub fn short_name(self) -> &'static str {
        match self {
            DeviceType::User => "user",
            DeviceType::Gateway => "gateway",
            DeviceType::App => "app",
            DeviceType::Thing => "thing",
            DeviceType::Router => "router",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("knot:").unwrap_or(s) {
            "user" => Ok(DeviceType::User),
            "gateway" => Ok(DeviceType::Gateway),
            "app" => Ok(DeviceType::App),
            "thing" => Ok(DeviceType::Thing),
            "router" => Ok(DeviceType::Router),
            other => Err(format!("unknown device type '{}'", other)),
        }
    }
}

impl Serialize for DeviceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeviceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// Devices of foreign types are read as untyped rather than rejected
fn lenient_device_type<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DeviceType>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// KNOT role-specific properties (`knot.*`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnotProperties {
    /// Thing id (16 hex chars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<String>,
    /// Owning user of an app or gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateways: Option<Vec<String>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl KnotProperties {
    fn is_empty(&self) -> bool {
        self == &KnotProperties::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshbluProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelists: Option<Whitelists>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A cloud device record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_device_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_type: Option<DeviceType>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "KnotProperties::is_empty")]
    pub knot: KnotProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meshblu: Option<MeshbluProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<SensorSchemaEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Device {
    pub fn new(device_type: DeviceType, name: Option<String>) -> Self {
        Self {
            device_type: Some(device_type),
            metadata: Metadata {
                name: Some(name.unwrap_or_default()),
                other: Map::new(),
            },
            ..Default::default()
        }
    }

    pub fn uuid(&self) -> &str {
        self.uuid.as_deref().unwrap_or_default()
    }

    pub fn whitelists(&self) -> Option<&Whitelists> {
        self.meshblu.as_ref().and_then(|m| m.whitelists.as_ref())
    }

    /// Whitelist document, created empty when the device has none
    pub fn whitelists_mut(&mut self) -> &mut Whitelists {
        self.meshblu
            .get_or_insert_with(MeshbluProperties::default)
            .whitelists
            .get_or_insert_with(Whitelists::default)
    }

    /// Credentials issued to this device at registration
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.uuid, &self.token) {
            (Some(uuid), Some(token)) => Some(Credentials::new(uuid.clone(), token.clone())),
            _ => None,
        }
    }
}
