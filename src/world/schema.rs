//! Typed wire schema for networked entities.
//!
//! Each entity kind declares an ordered list of properties, each with a
//! pure encode/decode pair. The declared order is the contract with the
//! client: bit *i* of a delta bitmask addresses schema index *i*, and no
//! negotiation happens at connect time. Diffing compares wire-encoded
//! values, so two floats that quantize identically count as unchanged.

use serde_json::Value;

use crate::world::citizen::{Citizen, CitizenState, Controller, Gender, Shield, Weapon};

#[derive(Debug, PartialEq, Eq)]
pub enum SchemaError {
    WrongType { property: &'static str },
    UnknownVariant { property: &'static str },
}

pub struct PropertyDef {
    pub name: &'static str,
    pub encode: fn(&Citizen) -> Value,
    pub decode: fn(&mut Citizen, &Value) -> Result<(), SchemaError>,
}

/// Index into the entity-kind table; prefixed to snapshots.
pub const CITIZEN_TYPE_INDEX: u64 = 0;

fn quant(v: f32, scale: f32) -> Value {
    Value::from((v * scale).round() as i64)
}

fn dequant(v: &Value, scale: f32, property: &'static str) -> Result<f32, SchemaError> {
    v.as_i64()
        .map(|i| i as f32 / scale)
        .ok_or(SchemaError::WrongType { property })
}

fn take_index(v: &Value, property: &'static str) -> Result<u8, SchemaError> {
    v.as_u64()
        .and_then(|i| u8::try_from(i).ok())
        .ok_or(SchemaError::WrongType { property })
}

fn take_bool(v: &Value, property: &'static str) -> Result<bool, SchemaError> {
    v.as_bool().ok_or(SchemaError::WrongType { property })
}

/// Broadcast properties, in wire order. Positions quantize to tenths
/// of a pixel and the facing angle to hundredths of a radian.
pub static CITIZEN_SCHEMA: &[PropertyDef] = &[
    PropertyDef {
        name: "name",
        encode: |c| Value::from(c.name.as_str()),
        decode: |c, v| {
            c.name = v
                .as_str()
                .ok_or(SchemaError::WrongType { property: "name" })?
                .to_string();
            Ok(())
        },
    },
    PropertyDef {
        name: "x",
        encode: |c| quant(c.x, 10.0),
        decode: |c, v| {
            c.x = dequant(v, 10.0, "x")?;
            Ok(())
        },
    },
    PropertyDef {
        name: "y",
        encode: |c| quant(c.y, 10.0),
        decode: |c, v| {
            c.y = dequant(v, 10.0, "y")?;
            Ok(())
        },
    },
    PropertyDef {
        name: "direction",
        encode: |c| quant(c.direction, 100.0),
        decode: |c, v| {
            c.direction = dequant(v, 100.0, "direction")?;
            Ok(())
        },
    },
    PropertyDef {
        name: "health",
        encode: |c| Value::from(c.health),
        decode: |c, v| {
            c.health = v
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .ok_or(SchemaError::WrongType { property: "health" })?;
            Ok(())
        },
    },
    PropertyDef {
        name: "max_health",
        encode: |c| Value::from(c.max_health),
        decode: |c, v| {
            c.max_health = v
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .ok_or(SchemaError::WrongType {
                    property: "max_health",
                })?;
            Ok(())
        },
    },
    PropertyDef {
        name: "weapon",
        encode: |c| Value::from(c.weapon.index()),
        decode: |c, v| {
            c.weapon = Weapon::from_index(take_index(v, "weapon")?)
                .ok_or(SchemaError::UnknownVariant { property: "weapon" })?;
            Ok(())
        },
    },
    PropertyDef {
        name: "shield",
        encode: |c| Value::from(c.shield.index()),
        decode: |c, v| {
            c.shield = Shield::from_index(take_index(v, "shield")?)
                .ok_or(SchemaError::UnknownVariant { property: "shield" })?;
            Ok(())
        },
    },
    PropertyDef {
        name: "team",
        encode: |c| Value::from(c.team),
        decode: |c, v| {
            c.team = take_index(v, "team")?;
            Ok(())
        },
    },
    PropertyDef {
        name: "state",
        encode: |c| Value::from(c.state().index()),
        decode: |c, v| {
            c.fsm.state = CitizenState::from_index(take_index(v, "state")?)
                .ok_or(SchemaError::UnknownVariant { property: "state" })?;
            Ok(())
        },
    },
    PropertyDef {
        name: "gender",
        encode: |c| Value::from(c.gender.index()),
        decode: |c, v| {
            c.gender = Gender::from_index(take_index(v, "gender")?)
                .ok_or(SchemaError::UnknownVariant { property: "gender" })?;
            Ok(())
        },
    },
    PropertyDef {
        name: "growling",
        encode: |c| Value::from(c.growling),
        decode: |c, v| {
            c.growling = take_bool(v, "growling")?;
            Ok(())
        },
    },
    PropertyDef {
        name: "moving",
        encode: |c| Value::from(c.moving),
        decode: |c, v| {
            c.moving = take_bool(v, "moving")?;
            Ok(())
        },
    },
];

/// Observer-private properties, unicast to the owning peer only.
pub static CITIZEN_PRIVATE_SCHEMA: &[PropertyDef] = &[
    PropertyDef {
        name: "stamina",
        encode: |c| quant(c.stamina, 100.0),
        decode: |c, v| {
            c.stamina = dequant(v, 100.0, "stamina")?;
            Ok(())
        },
    },
    PropertyDef {
        name: "score",
        encode: |c| Value::from(c.score),
        decode: |c, v| {
            c.score = v.as_i64().ok_or(SchemaError::WrongType { property: "score" })?;
            Ok(())
        },
    },
];

pub fn encode_with(schema: &[PropertyDef], c: &Citizen) -> Vec<Value> {
    schema.iter().map(|def| (def.encode)(c)).collect()
}

pub fn full_mask(schema: &[PropertyDef]) -> u32 {
    (1u32 << schema.len()) - 1
}

/// Full wire encoding, prefixed by the entity's type index. Sent once
/// per entity lifetime, plus on demand for late joiners.
pub fn snapshot(c: &Citizen) -> Value {
    let mut row = Vec::with_capacity(1 + CITIZEN_SCHEMA.len());
    row.push(Value::from(CITIZEN_TYPE_INDEX));
    row.extend(encode_with(CITIZEN_SCHEMA, c));
    Value::Array(row)
}

/// Wire-level diff against previously captured values: changed values
/// in schema order plus the bitmask addressing them.
pub fn diff(schema: &[PropertyDef], prev: &[Value], c: &Citizen) -> (u32, Vec<Value>) {
    let mut bits = 0u32;
    let mut changed = Vec::new();
    for (i, def) in schema.iter().enumerate() {
        let value = (def.encode)(c);
        if prev[i] != value {
            bits |= 1 << i;
            changed.push(value);
        }
    }
    (bits, changed)
}

/// Applies a bitmask-addressed value list. Decoding fails closed:
/// every addressed value is decoded against a scratch entity first, so
/// a bad value anywhere in the mask leaves the target untouched.
pub fn apply(
    schema: &[PropertyDef],
    c: &mut Citizen,
    bits: u32,
    values: &[Value],
) -> Result<(), SchemaError> {
    let mut scratch = Citizen::new(0, String::new(), 0.0, 0.0, 0, Controller::Player);
    decode_into(schema, &mut scratch, bits, values)?;
    decode_into(schema, c, bits, values)
}

fn decode_into(
    schema: &[PropertyDef],
    c: &mut Citizen,
    bits: u32,
    values: &[Value],
) -> Result<(), SchemaError> {
    let mut next = 0usize;
    for (i, def) in schema.iter().enumerate() {
        if (bits >> i) & 1 == 0 {
            continue;
        }
        let value = values.get(next).ok_or(SchemaError::WrongType {
            property: def.name,
        })?;
        (def.decode)(c, value)?;
        next += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::citizen::Controller;

    fn citizen() -> Citizen {
        Citizen::new(3, "cyd".to_string(), 5.0, 5.0, 1, Controller::Player)
    }

    #[test]
    fn diff_flags_only_changed_properties() {
        let mut c = citizen();
        let prev = encode_with(CITIZEN_SCHEMA, &c);

        let (bits, values) = diff(CITIZEN_SCHEMA, &prev, &c);
        assert_eq!(bits, 0);
        assert!(values.is_empty());

        c.health = 90;
        let (bits, values) = diff(CITIZEN_SCHEMA, &prev, &c);
        assert_eq!(bits, 1 << 4);
        assert_eq!(values, vec![Value::from(90)]);
    }

    #[test]
    fn quantization_hides_sub_resolution_jitter() {
        let mut c = citizen();
        let prev = encode_with(CITIZEN_SCHEMA, &c);

        // 5.0 -> 5.004 still encodes as 50 tenths.
        c.x = 5.004;
        let (bits, _) = diff(CITIZEN_SCHEMA, &prev, &c);
        assert_eq!(bits, 0);

        c.x = 5.06;
        let (bits, _) = diff(CITIZEN_SCHEMA, &prev, &c);
        assert_eq!(bits, 1 << 1);
    }

    #[test]
    fn snapshot_is_type_index_plus_all_properties() {
        let c = citizen();
        let Value::Array(row) = snapshot(&c) else {
            panic!("snapshot must be an array");
        };
        assert_eq!(row.len(), 1 + CITIZEN_SCHEMA.len());
        assert_eq!(row[0], Value::from(CITIZEN_TYPE_INDEX));
        assert_eq!(row[1], Value::from("cyd"));
    }

    #[test]
    fn apply_round_trips_encoded_values() {
        let mut a = citizen();
        a.x = 123.4;
        a.health = 42;
        a.weapon = Weapon::Sword;

        let mut b = citizen();
        let mask = full_mask(CITIZEN_SCHEMA);
        let values = encode_with(CITIZEN_SCHEMA, &a);
        apply(CITIZEN_SCHEMA, &mut b, mask, &values).expect("decode");

        assert_eq!(encode_with(CITIZEN_SCHEMA, &b), values);
        assert_eq!(b.health, 42);
        assert_eq!(b.weapon, Weapon::Sword);
    }

    #[test]
    fn apply_rejects_bad_values_without_partial_effects() {
        let mut c = citizen();
        // Bit 4 is health; a string is the wrong wire type.
        let err = apply(CITIZEN_SCHEMA, &mut c, 1 << 4, &[Value::from("nope")]);
        assert_eq!(
            err,
            Err(SchemaError::WrongType {
                property: "health"
            })
        );
        assert_eq!(c.health, crate::tuning::CITIZEN.max_health);

        // Unknown enum index fails as well.
        let err = apply(CITIZEN_SCHEMA, &mut c, 1 << 6, &[Value::from(99u8)]);
        assert_eq!(
            err,
            Err(SchemaError::UnknownVariant {
                property: "weapon"
            })
        );
    }

    #[test]
    fn apply_with_a_bad_value_mid_mask_changes_nothing() {
        let mut c = citizen();
        // Health (bit 4) decodes fine, weapon (bit 6) is an unknown
        // variant: neither write may land.
        let bits = (1 << 4) | (1 << 6);
        let err = apply(
            CITIZEN_SCHEMA,
            &mut c,
            bits,
            &[Value::from(55), Value::from(99u8)],
        );
        assert_eq!(
            err,
            Err(SchemaError::UnknownVariant {
                property: "weapon"
            })
        );
        assert_eq!(c.health, crate::tuning::CITIZEN.max_health);
        assert_eq!(c.weapon, Weapon::Axe);
    }
}
