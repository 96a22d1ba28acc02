//! KNOT sensor schemas and the values things publish against them.

mod table;
mod validation;

#[cfg(test)]
mod tests;

pub use table::{rule_for, TypeRule};
pub use validation::{validate_schema, validate_value};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum sensor name length
pub const MAX_NAME_LEN: usize = 23;

/// One sensor of a thing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSchemaEntry {
    pub sensor_id: u8,
    pub type_id: u16,
    pub value_type: u8,
    pub unit: u16,
    pub name: String,
}

/// Encoding of a sensor's values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Float,
    Bool,
    Raw,
}

impl ValueType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ValueType::Integer),
            2 => Some(ValueType::Float),
            3 => Some(ValueType::Bool),
            4 => Some(ValueType::Raw),
            _ => None,
        }
    }
}

/// A sensor reading as sent by clients: `{sensorId, value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorValue {
    pub sensor_id: i64,
    pub value: Value,
}
