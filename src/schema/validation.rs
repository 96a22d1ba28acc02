use super::table::rule_for;
use super::{SensorSchemaEntry, SensorValue, ValueType, MAX_NAME_LEN};
use crate::error::{GatewayError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

/// Validate a schema document against the KNOT type table.
///
/// Every violation in every entry is collected; a single violation is
/// reported as-is, several as a `- ` bulleted list.
pub fn validate_schema(schema: &Value) -> Result<Vec<SensorSchemaEntry>> {
    let entries = schema
        .as_array()
        .ok_or_else(|| GatewayError::bad_request("schema must be an array"))?;

    let mut violations = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match entry.as_object() {
            Some(fields) => check_entry(index, fields, &mut violations),
            None => violations.push(format!("schema[{}] must be an object", index)),
        }
    }

    if !violations.is_empty() {
        return Err(GatewayError::bad_request(format_violations(&violations)));
    }

    serde_json::from_value(schema.clone())
        .map_err(|e| GatewayError::bad_request(format!("Invalid schema: {}", e)))
}

fn format_violations(violations: &[String]) -> String {
    if violations.len() == 1 {
        return violations[0].clone();
    }
    violations
        .iter()
        .map(|v| format!("\n- {}", v))
        .collect::<String>()
}

fn integer_in<T>(value: Option<&Value>, range: &RangeInclusive<T>) -> bool
where
    T: Copy + PartialOrd + Into<u64>,
{
    value
        .and_then(Value::as_u64)
        .map_or(false, |n| n >= (*range.start()).into() && n <= (*range.end()).into())
}

fn describe<T: std::fmt::Display + PartialEq>(range: &RangeInclusive<T>) -> String {
    if range.start() == range.end() {
        range.start().to_string()
    } else {
        format!("between {} and {}", range.start(), range.end())
    }
}

fn check_entry(index: usize, fields: &Map<String, Value>, violations: &mut Vec<String>) {
    let sensor_id = fields.get("sensorId");
    let label = if integer_in(sensor_id, &(0u8..=u8::MAX)) {
        format!("sensor {}", sensor_id.and_then(Value::as_u64).unwrap_or_default())
    } else {
        let problem = if sensor_id.is_none() {
            "sensorId is required"
        } else {
            "sensorId must be an integer between 0 and 255"
        };
        violations.push(format!("schema[{}]: {}", index, problem));
        format!("schema[{}]", index)
    };

    match fields.get("typeId") {
        None => violations.push(format!("{}: typeId is required", label)),
        Some(type_id) => {
            let rule = type_id
                .as_u64()
                .and_then(|id| u16::try_from(id).ok())
                .and_then(|id| rule_for(id).map(|rule| (id, rule)));

            match rule {
                None => violations.push(format!("{}: typeId {} is not a KNOT type", label, type_id)),
                Some((type_id, rule)) => {
                    let value_type = fields.get("valueType");
                    if value_type.is_none() {
                        violations.push(format!("{}: valueType is required", label));
                    } else if !integer_in(value_type, &rule.value_types) {
                        violations.push(format!(
                            "{}: valueType must be {} for typeId {:#06x}",
                            label,
                            describe(&rule.value_types),
                            type_id
                        ));
                    }

                    let unit = fields.get("unit");
                    if unit.is_none() {
                        violations.push(format!("{}: unit is required", label));
                    } else if !integer_in(unit, &rule.units) {
                        violations.push(format!(
                            "{}: unit must be {} for typeId {:#06x}",
                            label,
                            describe(&rule.units),
                            type_id
                        ));
                    }
                }
            }
        }
    }

    match fields.get("name") {
        None => violations.push(format!("{}: name is required", label)),
        Some(Value::String(name)) if name.chars().count() > MAX_NAME_LEN => violations.push(
            format!("{}: name must be at most {} characters", label, MAX_NAME_LEN),
        ),
        Some(Value::String(_)) => {}
        Some(_) => violations.push(format!("{}: name must be a string", label)),
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
        }
        _ => false,
    }
}

fn is_base64(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty() && STANDARD.decode(s).is_ok(),
        _ => false,
    }
}

/// Check a reading against the thing's schema
pub fn validate_value(
    schema: &[SensorSchemaEntry],
    thing_id: &str,
    reading: &SensorValue,
) -> Result<()> {
    let entry = schema
        .iter()
        .find(|entry| i64::from(entry.sensor_id) == reading.sensor_id)
        .ok_or_else(|| {
            GatewayError::forbidden(format!(
                "The thing {} has no schema for sensor id {}",
                thing_id, reading.sensor_id
            ))
        })?;

    let (valid, message) = match ValueType::from_code(entry.value_type) {
        Some(ValueType::Integer) => (is_integer(&reading.value), "Value is not integer"),
        Some(ValueType::Float) => (reading.value.is_number(), "Value is not float"),
        Some(ValueType::Bool) => (reading.value.is_boolean(), "Value is not boolean"),
        Some(ValueType::Raw) => (is_base64(&reading.value), "Value is not in base 64"),
        None => (true, ""),
    };

    if valid {
        Ok(())
    } else {
        Err(GatewayError::forbidden(message))
    }
}
