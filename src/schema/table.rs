// KNOT sensor type table: valid (valueType, unit) per typeId

use std::ops::RangeInclusive;

/// Allowed value types and units for one typeId
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRule {
    pub value_types: RangeInclusive<u8>,
    pub units: RangeInclusive<u16>,
}

impl TypeRule {
    const fn new(value_types: RangeInclusive<u8>, units: RangeInclusive<u16>) -> Self {
        Self { value_types, units }
    }
}

const INT: RangeInclusive<u8> = 1..=1;
const FLOAT: RangeInclusive<u8> = 2..=2;

/// Generic/vendor types: any value type, no unit
fn is_unitless(type_id: u16) -> bool {
    matches!(type_id, 0x0000 | 0xfff0 | 0xfff1 | 0xfff2 | 0xff10)
}

/// Rule for `type_id`, `None` when the type is not in the table
pub fn rule_for(type_id: u16) -> Option<TypeRule> {
    if is_unitless(type_id) {
        return Some(TypeRule::new(1..=4, 0..=0));
    }

    let rule = match type_id {
        0x01 => TypeRule::new(INT, 1..=3),  // voltage
        0x02 => TypeRule::new(INT, 1..=2),  // current
        0x03 => TypeRule::new(INT, 1..=1),  // resistance
        0x04 => TypeRule::new(INT, 1..=3),  // power
        0x05 => TypeRule::new(INT, 1..=3),  // temperature
        0x06 => TypeRule::new(INT, 1..=1),  // relative humidity
        0x07 => TypeRule::new(INT, 1..=3),  // luminosity
        0x08 => TypeRule::new(INT, 1..=3),  // time
        0x09 => TypeRule::new(INT, 1..=4),  // mass
        0x0A => TypeRule::new(INT, 1..=3),  // pressure
        0x0B => TypeRule::new(INT, 1..=4),  // distance
        0x0C => TypeRule::new(FLOAT, 1..=2), // angle
        0x0D => TypeRule::new(FLOAT, 1..=4), // volume
        0x0E => TypeRule::new(FLOAT, 1..=3), // area
        0x0F => TypeRule::new(FLOAT, 1..=1), // rain
        0x10 => TypeRule::new(FLOAT, 1..=1), // density
        0x11 => TypeRule::new(FLOAT, 1..=1), // latitude
        0x12 => TypeRule::new(FLOAT, 1..=1), // longitude
        0x13 => TypeRule::new(INT, 1..=4),  // speed
        0x14 => TypeRule::new(FLOAT, 1..=6), // volume flow
        0x15 => TypeRule::new(INT, 1..=6),  // energy
        _ => return None,
    };
    Some(rule)
}
