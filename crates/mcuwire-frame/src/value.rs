//! Fixed-width wire values and their conversion to and from `f64`.
//!
//! Integers are little-endian. Encoding into an integer type saturates at
//! the type's range instead of wrapping; `F32` is stored bit-for-bit.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ValueError;

/// Wire value type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ValueType {
    U8 = 1,
    S8 = 2,
    U16 = 3,
    S16 = 4,
    U32 = 5,
    S32 = 6,
    F32 = 7,
    Raw = 8,
}

impl ValueType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Bytes one value occupies on the wire. `None` for variable-width raw data.
    pub fn wire_width(self) -> Option<usize> {
        match self {
            ValueType::U8 | ValueType::S8 => Some(1),
            ValueType::U16 | ValueType::S16 => Some(2),
            ValueType::U32 | ValueType::S32 | ValueType::F32 => Some(4),
            ValueType::Raw => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::U8 => "u8",
            ValueType::S8 => "s8",
            ValueType::U16 => "u16",
            ValueType::S16 => "s16",
            ValueType::U32 => "u32",
            ValueType::S32 => "s32",
            ValueType::F32 => "f32",
            ValueType::Raw => "raw",
        }
    }
}

impl TryFrom<u8> for ValueType {
    type Error = ValueError;

    fn try_from(tag: u8) -> Result<Self, ValueError> {
        match tag {
            1 => Ok(ValueType::U8),
            2 => Ok(ValueType::S8),
            3 => Ok(ValueType::U16),
            4 => Ok(ValueType::S16),
            5 => Ok(ValueType::U32),
            6 => Ok(ValueType::S32),
            7 => Ok(ValueType::F32),
            8 => Ok(ValueType::Raw),
            other => Err(ValueError::UnknownType(other)),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "u8" => Ok(ValueType::U8),
            "s8" | "i8" => Ok(ValueType::S8),
            "u16" => Ok(ValueType::U16),
            "s16" | "i16" => Ok(ValueType::S16),
            "u32" => Ok(ValueType::U32),
            "s32" | "i32" => Ok(ValueType::S32),
            "f32" | "float" => Ok(ValueType::F32),
            "raw" => Ok(ValueType::Raw),
            other => Err(format!("unknown value type '{other}'")),
        }
    }
}

/// Read one value of type `ty` from the start of `bytes`.
///
/// Extra trailing bytes are ignored.
pub fn decode_value(ty: ValueType, bytes: &[u8]) -> Result<f64, ValueError> {
    let need = ty.wire_width().ok_or(ValueError::NotNumeric)?;
    if bytes.len() < need {
        return Err(ValueError::Short {
            need,
            got: bytes.len(),
        });
    }

    let value = match ty {
        ValueType::U8 => bytes[0] as f64,
        ValueType::S8 => bytes[0] as i8 as f64,
        ValueType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
        ValueType::S16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
        ValueType::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        ValueType::S32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        ValueType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        ValueType::Raw => return Err(ValueError::NotNumeric),
    };
    Ok(value)
}

/// Serialise `value` as type `ty`.
///
/// Integer targets truncate toward zero and clamp to the representable
/// range; NaN and infinities are rejected.
pub fn encode_value(ty: ValueType, value: f64) -> Result<Vec<u8>, ValueError> {
    let bytes = match ty {
        ValueType::Raw => return Err(ValueError::NotNumeric),
        ValueType::F32 => (value as f32).to_le_bytes().to_vec(),
        _ if !value.is_finite() => return Err(ValueError::NonFinite),
        ValueType::U8 => vec![saturate(value, u8::MIN as f64, u8::MAX as f64) as u8],
        ValueType::S8 => vec![saturate(value, i8::MIN as f64, i8::MAX as f64) as i8 as u8],
        ValueType::U16 => (saturate(value, u16::MIN as f64, u16::MAX as f64) as u16)
            .to_le_bytes()
            .to_vec(),
        ValueType::S16 => (saturate(value, i16::MIN as f64, i16::MAX as f64) as i16)
            .to_le_bytes()
            .to_vec(),
        ValueType::U32 => (saturate(value, u32::MIN as f64, u32::MAX as f64) as u32)
            .to_le_bytes()
            .to_vec(),
        ValueType::S32 => (saturate(value, i32::MIN as f64, i32::MAX as f64) as i32)
            .to_le_bytes()
            .to_vec(),
    };
    Ok(bytes)
}

fn saturate(value: f64, min: f64, max: f64) -> f64 {
    value.trunc().clamp(min, max)
}
