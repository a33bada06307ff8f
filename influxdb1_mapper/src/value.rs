//! Typed field values and the conversions between Rust types and the wire.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::CoercionError;

/// Declared type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Possible value types of a point field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::String(_) => FieldKind::String,
            Self::Integer(_) => FieldKind::Integer,
            Self::Float(_) => FieldKind::Float,
            Self::Boolean(_) => FieldKind::Boolean,
            Self::Timestamp(_) => FieldKind::Timestamp,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// The value carried by a scalar JSON value. Integral numbers that fit
    /// in an `i64` are integers, other numbers floats. `None` for `null`,
    /// arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Boolean(*b)),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// The string a wire value is stored as when it is used as a tag, the same
/// form [`FieldValue`]'s `Display` gives encoded tags. `None` for `null`.
pub fn tag_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        scalar => FieldValue::from_json(scalar).map(|v| v.to_string()),
    }
}

/// The default string form, used when a value is stored as a tag.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(v) => f.write_str(v),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Timestamp(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(other: bool) -> Self {
        Self::Boolean(other)
    }
}

impl From<f64> for FieldValue {
    fn from(other: f64) -> Self {
        Self::Float(other)
    }
}

impl From<i64> for FieldValue {
    fn from(other: i64) -> Self {
        Self::Integer(other)
    }
}

impl From<&str> for FieldValue {
    fn from(other: &str) -> Self {
        Self::String(other.into())
    }
}

impl From<String> for FieldValue {
    fn from(other: String) -> Self {
        Self::String(other)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(other: DateTime<Utc>) -> Self {
        Self::Timestamp(other)
    }
}

/// Type of a field that only carries a `measurement:<name>` property.
pub type Measurement = String;

/// A Rust type that can be stored in a record field.
///
/// Absent or `null` wire values decode to [`Default::default`].
pub trait FieldType: Default + Sized {
    const KIND: FieldKind;

    /// `None` leaves the field out of the encoded point.
    fn to_field_value(&self) -> Option<FieldValue>;

    /// Convert a non-null wire value.
    fn from_wire(value: &Value) -> Result<Self, CoercionError>;
}

/// Short name of a JSON value's type, for error messages.
pub(crate) fn wire_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(expected: FieldKind, value: &Value) -> CoercionError {
    CoercionError::Mismatch {
        expected,
        found: wire_kind(value),
    }
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::String;

    fn to_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::String(self.clone()))
    }

    fn from_wire(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch(Self::KIND, other)),
        }
    }
}

impl FieldType for bool {
    const KIND: FieldKind = FieldKind::Boolean;

    fn to_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Boolean(*self))
    }

    fn from_wire(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(Self::KIND, other)),
        }
    }
}

/// Integral value of a wire number; floats are accepted when they have no
/// fractional part.
fn integer_from_wire(value: &Value) -> Result<i64, CoercionError> {
    let Value::Number(n) = value else {
        return Err(mismatch(FieldKind::Integer, value));
    };

    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    if n.is_u64() {
        return Err(CoercionError::OutOfRange {
            value: n.to_string(),
            target: "i64",
        });
    }

    let f = n.as_f64().unwrap_or(f64::NAN);
    if f.fract() != 0.0 || !f.is_finite() {
        return Err(CoercionError::NotIntegral { value: f });
    }
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return Err(CoercionError::OutOfRange {
            value: n.to_string(),
            target: "i64",
        });
    }
    Ok(f as i64)
}

macro_rules! impl_integer_field_type {
    ($($t:ty),*) => {
        $(
            impl FieldType for $t {
                const KIND: FieldKind = FieldKind::Integer;

                fn to_field_value(&self) -> Option<FieldValue> {
                    Some(FieldValue::Integer(i64::from(*self)))
                }

                fn from_wire(value: &Value) -> Result<Self, CoercionError> {
                    let i = integer_from_wire(value)?;
                    Self::try_from(i).map_err(|_| CoercionError::OutOfRange {
                        value: i.to_string(),
                        target: stringify!($t),
                    })
                }
            }
        )*
    };
}

impl_integer_field_type!(i8, i16, i32, i64, u8, u16, u32);

impl FieldType for f64 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Float(*self))
    }

    fn from_wire(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Number(n) => n.as_f64().ok_or_else(|| mismatch(Self::KIND, value)),
            other => Err(mismatch(Self::KIND, other)),
        }
    }
}

impl FieldType for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Float(f64::from(*self)))
    }

    fn from_wire(value: &Value) -> Result<Self, CoercionError> {
        f64::from_wire(value).map(|f| f as Self)
    }
}

impl FieldType for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn to_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Timestamp(*self))
    }

    fn from_wire(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::String(s) => parse_timestamp(s),
            // epoch queries return integer nanoseconds
            Value::Number(_) => integer_from_wire(value).map(Self::from_timestamp_nanos),
            other => Err(mismatch(Self::KIND, other)),
        }
    }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CoercionError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| CoercionError::Timestamp {
            value: s.to_owned(),
            source,
        })
}

impl<T: FieldType> FieldType for Option<T> {
    const KIND: FieldKind = T::KIND;

    fn to_field_value(&self) -> Option<FieldValue> {
        self.as_ref().and_then(T::to_field_value)
    }

    fn from_wire(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_wire(other).map(Some),
        }
    }
}
