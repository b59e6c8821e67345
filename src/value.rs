//! Value Codec: packing, unpacking, and comparing the six supported numeric
//! types. All encodings are little-endian — a big-endian port would need an
//! endian tag plumbed through here.

use std::fmt;

use crate::error::{Error, Result};

/// A numeric type tag the engine can search, snapshot, or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ValueType {
    /// Byte width of this type's little-endian encoding.
    pub fn size(self) -> usize {
        match self {
            ValueType::Int32 | ValueType::UInt32 | ValueType::Float32 => 4,
            ValueType::Int64 | ValueType::UInt64 | ValueType::Float64 => 8,
        }
    }

    /// Parses the CLI/config token spelling ("int32", "uint64", "float32", ...).
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "int32" => Ok(ValueType::Int32),
            "uint32" => Ok(ValueType::UInt32),
            "int64" => Ok(ValueType::Int64),
            "uint64" => Ok(ValueType::UInt64),
            "float32" => Ok(ValueType::Float32),
            "float64" => Ok(ValueType::Float64),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            ValueType::Int32 => "int32",
            ValueType::UInt32 => "uint32",
            ValueType::Int64 => "int64",
            ValueType::UInt64 => "uint64",
            ValueType::Float32 => "float32",
            ValueType::Float64 => "float64",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// A decoded value of one of the six supported types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
}

impl Value {
    pub fn value_type(self) -> ValueType {
        match self {
            Value::Int32(_) => ValueType::Int32,
            Value::UInt32(_) => ValueType::UInt32,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt64(_) => ValueType::UInt64,
            Value::Float32(_) => ValueType::Float32,
            Value::Float64(_) => ValueType::Float64,
        }
    }

    /// Coerces to `f64` for trend comparisons and JSON serialization. Exact
    /// for every supported integer width; float64 is already the widest
    /// float we support.
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int32(v) => v as f64,
            Value::UInt32(v) => v as f64,
            Value::Int64(v) => v as f64,
            Value::UInt64(v) => v as f64,
            Value::Float32(v) => v as f64,
            Value::Float64(v) => v,
        }
    }

    /// Equality: bitwise for integers, tolerance for floats (1e-5 for
    /// float32, 1e-9 for float64).
    pub fn approx_eq(self, other: Value) -> bool {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => (a - b).abs() <= 1e-5,
            (Value::Float64(a), Value::Float64(b)) => (a - b).abs() <= 1e-9,
            _ => false,
        }
    }

    /// Ordering used by the Candidate Filter's `increased`/`decreased`
    /// trends. Defined over the `f64` projection so mismatched-but-coercible
    /// types (shouldn't occur in practice — snapshots are single-typed) still
    /// compare sensibly.
    pub fn gt(self, other: Value) -> bool {
        self.as_f64() > other.as_f64()
    }

    pub fn lt(self, other: Value) -> bool {
        self.as_f64() < other.as_f64()
    }
}

/// Packs `raw` (as supplied by a user or config, always `f64` so a single
/// entry point handles both integer and float targets) into `value_type`'s
/// little-endian byte representation.
///
/// Packing a float into an integer type rounds half-away-from-zero rather
/// than failing — `3.7` into `int32` becomes `4`, not an error.
pub fn pack(raw: f64, value_type: ValueType) -> Vec<u8> {
    match value_type {
        ValueType::Int32 => (round_half_away_from_zero(raw) as i32).to_le_bytes().to_vec(),
        ValueType::UInt32 => (round_half_away_from_zero(raw).max(0.0) as u32)
            .to_le_bytes()
            .to_vec(),
        ValueType::Int64 => (round_half_away_from_zero(raw) as i64).to_le_bytes().to_vec(),
        ValueType::UInt64 => (round_half_away_from_zero(raw).max(0.0) as u64)
            .to_le_bytes()
            .to_vec(),
        ValueType::Float32 => (raw as f32).to_le_bytes().to_vec(),
        ValueType::Float64 => raw.to_le_bytes().to_vec(),
    }
}

fn round_half_away_from_zero(raw: f64) -> f64 {
    if raw >= 0.0 {
        (raw + 0.5).floor()
    } else {
        (raw - 0.5).ceil()
    }
}

/// Unpacks exactly `value_type.size()` bytes from `bytes` (starting at
/// offset 0) into a decoded [`Value`].
///
/// # Panics
/// Panics if `bytes` is shorter than `value_type.size()`. Callers (the
/// Snapshot Engine, Value Searcher) only ever invoke this after slicing a
/// chunk to the right width.
pub fn unpack(bytes: &[u8], value_type: ValueType) -> Value {
    match value_type {
        ValueType::Int32 => Value::Int32(i32::from_le_bytes(bytes[..4].try_into().unwrap())),
        ValueType::UInt32 => Value::UInt32(u32::from_le_bytes(bytes[..4].try_into().unwrap())),
        ValueType::Int64 => Value::Int64(i64::from_le_bytes(bytes[..8].try_into().unwrap())),
        ValueType::UInt64 => Value::UInt64(u64::from_le_bytes(bytes[..8].try_into().unwrap())),
        ValueType::Float32 => Value::Float32(f32::from_le_bytes(bytes[..4].try_into().unwrap())),
        ValueType::Float64 => Value::Float64(f64::from_le_bytes(bytes[..8].try_into().unwrap())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_every_type() {
        let cases: &[(f64, ValueType)] = &[
            (42.0, ValueType::Int32),
            (4294967295.0, ValueType::UInt32),
            (-1234567890123.0, ValueType::Int64),
            (9876543210.0, ValueType::UInt64),
            (3.14159, ValueType::Float32),
            (2.718281828459045, ValueType::Float64),
        ];
        for &(raw, ty) in cases {
            let packed = pack(raw, ty);
            assert_eq!(packed.len(), ty.size());
            let value = unpack(&packed, ty);
            assert_eq!(value.value_type(), ty);
            match ty {
                ValueType::Float32 => assert!((value.as_f64() - raw).abs() < 1e-4),
                ValueType::Float64 => assert!((value.as_f64() - raw).abs() < 1e-9),
                _ => assert_eq!(value.as_f64(), raw.round()),
            }
        }
    }

    #[test]
    fn float_into_int_rounds_half_away_from_zero() {
        assert_eq!(i32::from_le_bytes(pack(3.7, ValueType::Int32).try_into().unwrap()), 4);
        assert_eq!(i32::from_le_bytes(pack(-3.7, ValueType::Int32).try_into().unwrap()), -4);
        assert_eq!(i32::from_le_bytes(pack(3.5, ValueType::Int32).try_into().unwrap()), 4);
        assert_eq!(i32::from_le_bytes(pack(-3.5, ValueType::Int32).try_into().unwrap()), -4);
    }

    #[test]
    fn float_tolerance_equality() {
        assert!(Value::Float32(1.0).approx_eq(Value::Float32(1.0 + 5e-6)));
        assert!(!Value::Float32(1.0).approx_eq(Value::Float32(1.0 + 5e-4)));
        assert!(Value::Float64(1.0).approx_eq(Value::Float64(1.0 + 1e-10)));
        assert!(!Value::Float64(1.0).approx_eq(Value::Float64(1.0 + 1e-6)));
    }

    #[test]
    fn integer_equality_is_exact() {
        assert!(Value::Int32(5).approx_eq(Value::Int32(5)));
        assert!(!Value::Int32(5).approx_eq(Value::Int32(6)));
    }

    #[test]
    fn parse_rejects_unknown_token() {
        assert!(matches!(ValueType::parse("int128"), Err(Error::UnsupportedType(_))));
    }
}
