use super::*;
use serde_json::json;

fn entry(sensor_id: u8, type_id: u16, value_type: u8, unit: u16) -> SensorSchemaEntry {
    SensorSchemaEntry {
        sensor_id,
        type_id,
        value_type,
        unit,
        name: "sensor".to_string(),
    }
}

fn reading(sensor_id: i64, value: Value) -> SensorValue {
    SensorValue { sensor_id, value }
}

#[test]
fn test_valid_schema_parses() {
    let schema = json!([
        {"sensorId": 0, "typeId": 5, "valueType": 1, "unit": 1, "name": "Temperature"},
        {"sensorId": 1, "typeId": 0xfff1, "valueType": 3, "unit": 0, "name": "Switch"},
        {"sensorId": 255, "typeId": 0x14, "valueType": 2, "unit": 6, "name": "Flow"}
    ]);

    let entries = validate_schema(&schema).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].type_id, 0xfff1);
    assert_eq!(entries[2].sensor_id, 255);
}

#[test]
fn test_value_type_mismatch_names_sensor() {
    let schema = json!([{"sensorId": 0, "typeId": 1, "valueType": 2, "unit": 1, "name": "x"}]);

    let err = validate_schema(&schema).unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.message().contains("sensor 0"), "{}", err.message());
    assert!(err.message().contains("valueType"), "{}", err.message());
    assert!(!err.message().starts_with('\n'));
}

#[test]
fn test_all_violations_are_collected() {
    let schema = json!([
        {"sensorId": 0, "typeId": 1, "valueType": 2, "unit": 9, "name": "x"},
        {"sensorId": 300, "typeId": 0x16, "valueType": 1, "unit": 1,
         "name": "a name that is way too long for knot"}
    ]);

    let err = validate_schema(&schema).unwrap_err();
    let message = err.message();
    assert!(message.starts_with("\n- "), "{}", message);

    let lines: Vec<&str> = message.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 5, "{}", message);
    assert!(lines[0].starts_with("- sensor 0: valueType"));
    assert!(lines[1].starts_with("- sensor 0: unit"));
    assert!(lines[2].starts_with("- schema[1]: sensorId"));
    assert!(lines[3].starts_with("- schema[1]: typeId"));
    assert!(lines[4].starts_with("- schema[1]: name"));
}

#[test]
fn test_missing_fields_are_reported() {
    let err = validate_schema(&json!([{"sensorId": 3}])).unwrap_err();
    let message = err.message();
    assert!(message.contains("sensor 3: typeId is required"));
    assert!(message.contains("sensor 3: name is required"));
}

#[test]
fn test_schema_must_be_array_of_objects() {
    assert_eq!(validate_schema(&json!({"sensorId": 0})).unwrap_err().code(), 400);
    let err = validate_schema(&json!([42])).unwrap_err();
    assert_eq!(err.message(), "schema[0] must be an object");
}

#[test]
fn test_unitless_types_require_unit_zero() {
    let schema = json!([{"sensorId": 1, "typeId": 0xff10, "valueType": 4, "unit": 1, "name": "blob"}]);
    let err = validate_schema(&schema).unwrap_err();
    assert!(err.message().contains("unit must be 0"));
}

#[test]
fn test_type_table_boundaries() {
    assert_eq!(rule_for(0x15).unwrap().units, 1..=6);
    assert_eq!(rule_for(0x0C).unwrap().value_types, 2..=2);
    assert_eq!(rule_for(0x13).unwrap().value_types, 1..=1);
    assert_eq!(rule_for(0xfff2).unwrap().value_types, 1..=4);
    assert!(rule_for(0x16).is_none());
    assert!(rule_for(0xfff3).is_none());
    assert!(rule_for(0xff11).is_none());
}

#[test]
fn test_value_bool() {
    let schema = vec![entry(0, 0xfff0, 3, 0)];
    let err = validate_value(&schema, "0123456789abcdef", &reading(0, json!(42))).unwrap_err();
    assert_eq!(err.code(), 403);
    assert_eq!(err.message(), "Value is not boolean");

    assert!(validate_value(&schema, "0123456789abcdef", &reading(0, json!(true))).is_ok());
}

#[test]
fn test_value_integer() {
    let schema = vec![entry(1, 5, 1, 1)];
    assert!(validate_value(&schema, "t", &reading(1, json!(-21))).is_ok());
    assert!(validate_value(&schema, "t", &reading(1, json!(21.0))).is_ok());

    let err = validate_value(&schema, "t", &reading(1, json!(21.5))).unwrap_err();
    assert_eq!(err.message(), "Value is not integer");
    assert!(validate_value(&schema, "t", &reading(1, json!("21"))).is_err());
}

#[test]
fn test_value_float() {
    let schema = vec![entry(2, 0x11, 2, 1)];
    assert!(validate_value(&schema, "t", &reading(2, json!(-8.05))).is_ok());
    assert!(validate_value(&schema, "t", &reading(2, json!(3))).is_ok());

    let err = validate_value(&schema, "t", &reading(2, json!(null))).unwrap_err();
    assert_eq!(err.message(), "Value is not float");
}

#[test]
fn test_value_base64() {
    let schema = vec![entry(3, 0xff10, 4, 0)];
    assert!(validate_value(&schema, "t", &reading(3, json!("aGVsbG8="))).is_ok());

    for bad in [json!("not base64!"), json!(""), json!(12)] {
        let err = validate_value(&schema, "t", &reading(3, bad)).unwrap_err();
        assert_eq!(err.message(), "Value is not in base 64");
    }
}

#[test]
fn test_unknown_sensor_is_forbidden() {
    let schema = vec![entry(0, 5, 1, 1)];
    let err = validate_value(&schema, "0123456789abcdef", &reading(7, json!(1))).unwrap_err();
    assert_eq!(err.code(), 403);
    assert_eq!(
        err.message(),
        "The thing 0123456789abcdef has no schema for sensor id 7"
    );
}
