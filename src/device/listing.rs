//! Device listing visibility.
//!
//! Listings never expose credentials, ACLs or routing. Queries that filter on
//! any of those fields return nothing.

use super::{Device, DeviceType, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields no listing may reveal or be filtered on
pub const HIDDEN_FIELDS: [&str; 5] = ["uuid", "token", "meshblu", "online", "knot.router"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnotListing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateways: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Public projection of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceListing {
    #[serde(rename = "type")]
    pub device_type: String,
    pub metadata: Metadata,
    pub knot: KnotListing,
}

impl DeviceListing {
    /// `None` for untyped devices, which are never listed
    pub fn from_device(device: &Device) -> Option<Self> {
        let device_type = device.device_type?;
        Some(Self {
            device_type: device_type.short_name().to_string(),
            metadata: device.metadata.clone(),
            knot: KnotListing {
                active: device.knot.active,
                gateways: device.knot.gateways.clone(),
                id: device.knot.id.clone(),
            },
        })
    }
}

/// Dotted field paths a search query filters on.
///
/// Operator keys (`$in`, `$exists`, ...) belong to their parent path; operator
/// arrays such as `$or` are searched for nested conditions.
pub fn query_paths(query: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(query, "", &mut paths);
    paths
}

fn collect_paths(value: &Value, prefix: &str, paths: &mut Vec<String>) {
    let Value::Object(map) = value else {
        if !prefix.is_empty() {
            paths.push(prefix.to_string());
        }
        return;
    };

    if map.is_empty() && !prefix.is_empty() {
        paths.push(prefix.to_string());
    }

    for (key, child) in map {
        if key.starts_with('$') {
            match child {
                Value::Array(items) => {
                    for item in items {
                        collect_paths(item, prefix, paths);
                    }
                }
                _ if !prefix.is_empty() => paths.push(prefix.to_string()),
                _ => {}
            }
            continue;
        }

        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        collect_paths(child, &path, paths);
    }
}

/// True when `path` names a hidden field, something inside one, or a
/// non-object value that would contain one
fn touches_hidden(path: &str) -> bool {
    HIDDEN_FIELDS.iter().any(|hidden| {
        path == *hidden
            || path.starts_with(&format!("{}.", hidden))
            || hidden.starts_with(&format!("{}.", path))
    })
}

pub fn queries_hidden_field(query: &Value) -> bool {
    query_paths(query).iter().any(|path| touches_hidden(path))
}

/// Listing of `devices` as seen by `caller_uuid`: no routers, no untyped
/// devices, not the caller itself
pub fn visible_listing(devices: &[Device], caller_uuid: &str) -> Vec<DeviceListing> {
    devices
        .iter()
        .filter(|device| device.uuid.as_deref() != Some(caller_uuid))
        .filter(|device| device.device_type != Some(DeviceType::Router))
        .filter_map(DeviceListing::from_device)
        .collect()
}
