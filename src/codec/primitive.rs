//! Fixed-width and compact integer primitives

use crate::error::{InterfaceError, Result};
use crate::registry::Primitive;
use crate::types::Hash;
use blake2::{digest::consts::U32, Blake2b, Digest};
use parity_scale_codec::{Compact, Decode, Encode};
use scale_value::{Primitive as ScalePrimitive, Value, ValueDef};

/// Blake2-256 hash
pub fn blake2_256(data: &[u8]) -> Hash {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

pub fn encode_compact(value: u128, dest: &mut Vec<u8>) {
    Compact(value).encode_to(dest);
}

pub fn decode_compact(input: &mut &[u8]) -> Result<u128> {
    Ok(Compact::<u128>::decode(input)?.0)
}

/// Byte width of a fixed-width integer primitive
fn width(primitive: Primitive) -> usize {
    match primitive {
        Primitive::Bool | Primitive::U8 | Primitive::I8 => 1,
        Primitive::U16 | Primitive::I16 => 2,
        Primitive::U32 | Primitive::I32 => 4,
        Primitive::U64 | Primitive::I64 => 8,
        Primitive::U128 | Primitive::I128 => 16,
        Primitive::Text => 0,
    }
}

fn signed_bounds(primitive: Primitive) -> Option<(i128, i128)> {
    match primitive {
        Primitive::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
        Primitive::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
        Primitive::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
        Primitive::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
        Primitive::I128 => Some((i128::MIN, i128::MAX)),
        _ => None,
    }
}

/// Read an unsigned integer out of a dynamic value.
///
/// Decimal strings are accepted so amounts above 2^53 survive JSON callers.
pub fn value_as_u128(value: &Value) -> std::result::Result<u128, String> {
    match &value.value {
        ValueDef::Primitive(ScalePrimitive::U128(n)) => Ok(*n),
        ValueDef::Primitive(ScalePrimitive::I128(n)) => {
            u128::try_from(*n).map_err(|_| format!("{} is negative", n))
        }
        ValueDef::Primitive(ScalePrimitive::String(s)) => s
            .parse::<u128>()
            .map_err(|_| format!("`{}` is not an unsigned integer", s)),
        other => Err(format!("expected unsigned integer, got {:?}", other)),
    }
}

fn value_as_i128(value: &Value) -> std::result::Result<i128, String> {
    match &value.value {
        ValueDef::Primitive(ScalePrimitive::I128(n)) => Ok(*n),
        ValueDef::Primitive(ScalePrimitive::U128(n)) => {
            i128::try_from(*n).map_err(|_| format!("{} out of range", n))
        }
        ValueDef::Primitive(ScalePrimitive::String(s)) => s
            .parse::<i128>()
            .map_err(|_| format!("`{}` is not an integer", s)),
        other => Err(format!("expected integer, got {:?}", other)),
    }
}

/// Encode `value` as `primitive`; the error is the cause only
pub fn encode_primitive(
    primitive: Primitive,
    value: &Value,
    dest: &mut Vec<u8>,
) -> std::result::Result<(), String> {
    match primitive {
        Primitive::Bool => match value.value {
            ValueDef::Primitive(ScalePrimitive::Bool(b)) => {
                dest.push(b as u8);
                Ok(())
            }
            ref other => Err(format!("expected bool, got {:?}", other)),
        },
        Primitive::Text => match &value.value {
            ValueDef::Primitive(ScalePrimitive::String(s)) => {
                s.encode_to(dest);
                Ok(())
            }
            other => Err(format!("expected string, got {:?}", other)),
        },
        Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64 | Primitive::U128 => {
            let n = value_as_u128(value)?;
            let max = primitive.unsigned_max().unwrap_or(u128::MAX);
            if n > max {
                return Err(format!("{} out of range for {}", n, primitive.name()));
            }
            dest.extend_from_slice(&n.to_le_bytes()[..width(primitive)]);
            Ok(())
        }
        Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64 | Primitive::I128 => {
            let n = value_as_i128(value)?;
            let (min, max) = signed_bounds(primitive).unwrap_or((i128::MIN, i128::MAX));
            if n < min || n > max {
                return Err(format!("{} out of range for {}", n, primitive.name()));
            }
            dest.extend_from_slice(&n.to_le_bytes()[..width(primitive)]);
            Ok(())
        }
    }
}

fn take<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if input.len() < len {
        return Err(InterfaceError::Decode(format!(
            "Need {} bytes, {} remaining",
            len,
            input.len()
        )));
    }
    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

pub fn decode_primitive(primitive: Primitive, input: &mut &[u8]) -> Result<Value> {
    match primitive {
        Primitive::Bool => match take(input, 1)?[0] {
            0 => Ok(Value::bool(false)),
            1 => Ok(Value::bool(true)),
            other => Err(InterfaceError::Decode(format!("Invalid bool byte {}", other))),
        },
        Primitive::Text => Ok(Value::string(String::decode(input)?)),
        Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64 | Primitive::U128 => {
            let mut buf = [0u8; 16];
            buf[..width(primitive)].copy_from_slice(take(input, width(primitive))?);
            Ok(Value::u128(u128::from_le_bytes(buf)))
        }
        Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64 | Primitive::I128 => {
            let bytes = take(input, width(primitive))?;
            // Sign-extend from the top byte
            let fill = if bytes[bytes.len() - 1] & 0x80 != 0 { 0xff } else { 0 };
            let mut buf = [fill; 16];
            buf[..bytes.len()].copy_from_slice(bytes);
            Ok(Value::i128(i128::from_le_bytes(buf)))
        }
    }
}
