//! Conversions between Rust field types and [`SqlValue`].

use chrono::{DateTime, Utc};

use super::StorageKind;
use crate::error::ValueError;
use crate::value::{format_time, parse_time, time_from_epoch, SqlValue};

/// A Rust type that can back a column.
///
/// NULL decodes to the zero value of non-optional types.
pub trait FieldValue: Send + Sync + 'static {
    /// Storage kind, or `None` when it cannot be determined from the type.
    const KIND: Option<StorageKind>;
    /// Whether the type can hold NULL.
    const NULLABLE: bool = false;

    /// Encodes the field.
    fn to_value(&self) -> SqlValue;

    /// Decodes a cell.
    fn from_value(value: SqlValue) -> Result<Self, ValueError>
    where
        Self: Sized;
}

const fn mismatch(expected: &'static str, found: &SqlValue) -> ValueError {
    ValueError::Mismatch {
        expected,
        found: found.type_name(),
    }
}

impl FieldValue for bool {
    const KIND: Option<StorageKind> = Some(StorageKind::Bool);

    fn to_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(false),
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(n) => Ok(n != 0),
            SqlValue::Float(f) => Ok(f != 0.0),
            SqlValue::Text(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "t" | "true" => Ok(true),
                "0" | "f" | "false" | "" => Ok(false),
                _ => Err(mismatch("bool", &value)),
            },
            other => Err(mismatch("bool", &other)),
        }
    }
}

fn integer_of(value: &SqlValue, expected: &'static str) -> Result<i64, ValueError> {
    match value {
        SqlValue::Null => Ok(0),
        SqlValue::Bool(b) => Ok(i64::from(*b)),
        SqlValue::Int(n) => Ok(*n),
        #[allow(clippy::cast_possible_truncation)]
        SqlValue::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        SqlValue::Text(s) => s.trim().parse().map_err(|_| mismatch(expected, value)),
        other => Err(mismatch(expected, other)),
    }
}

macro_rules! integer_field {
    ($kind:expr => $($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                const KIND: Option<StorageKind> = Some($kind);

                fn to_value(&self) -> SqlValue {
                    SqlValue::Int(i64::from(*self))
                }

                fn from_value(value: SqlValue) -> Result<Self, ValueError> {
                    let n = integer_of(&value, stringify!($ty))?;
                    <$ty>::try_from(n).map_err(|_| ValueError::OutOfRange(stringify!($ty)))
                }
            }
        )*
    };
}

integer_field!(StorageKind::Int => i8, i16, i32, i64);
integer_field!(StorageKind::Uint => u8, u16, u32);

// u64 is stored in the signed 64-bit integer slot bit for bit.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
impl FieldValue for u64 {
    const KIND: Option<StorageKind> = Some(StorageKind::Uint);

    fn to_value(&self) -> SqlValue {
        SqlValue::Int(*self as i64)
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        integer_of(&value, "u64").map(|n| n as u64)
    }
}

fn float_of(value: &SqlValue, expected: &'static str) -> Result<f64, ValueError> {
    match value {
        SqlValue::Null => Ok(0.0),
        SqlValue::Float(f) => Ok(*f),
        #[allow(clippy::cast_precision_loss)]
        SqlValue::Int(n) => Ok(*n as f64),
        SqlValue::Text(s) => s.trim().parse().map_err(|_| mismatch(expected, value)),
        other => Err(mismatch(expected, other)),
    }
}

impl FieldValue for f64 {
    const KIND: Option<StorageKind> = Some(StorageKind::Float);

    fn to_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        float_of(&value, "f64")
    }
}

impl FieldValue for f32 {
    const KIND: Option<StorageKind> = Some(StorageKind::Float);

    fn to_value(&self) -> SqlValue {
        SqlValue::Float(f64::from(*self))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        float_of(&value, "f32").map(|f| f as f32)
    }
}

impl FieldValue for String {
    const KIND: Option<StorageKind> = Some(StorageKind::String);

    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(Self::new()),
            SqlValue::Text(s) => Ok(s),
            SqlValue::Int(n) => Ok(n.to_string()),
            SqlValue::Float(f) => Ok(f.to_string()),
            SqlValue::Bool(b) => Ok(if b { "1" } else { "0" }.to_string()),
            SqlValue::Time(t) => Ok(format_time(&t)),
            SqlValue::Blob(b) => {
                Self::from_utf8(b).map_err(|_| ValueError::Mismatch {
                    expected: "utf-8 text",
                    found: "blob",
                })
            }
        }
    }
}

impl FieldValue for Vec<u8> {
    const KIND: Option<StorageKind> = Some(StorageKind::Bytes);

    fn to_value(&self) -> SqlValue {
        SqlValue::Blob(self.clone())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(Self::new()),
            SqlValue::Blob(b) => Ok(b),
            SqlValue::Text(s) => Ok(s.into_bytes()),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl FieldValue for DateTime<Utc> {
    const KIND: Option<StorageKind> = Some(StorageKind::Time);

    fn to_value(&self) -> SqlValue {
        SqlValue::Time(*self)
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(Self::default()),
            SqlValue::Time(t) => Ok(t),
            SqlValue::Text(s) => parse_time(&s),
            SqlValue::Int(secs) => time_from_epoch(secs),
            other => Err(mismatch("time", &other)),
        }
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    const KIND: Option<StorageKind> = V::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, FieldValue::to_value)
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        if value.is_null() {
            Ok(None)
        } else {
            V::from_value(value).map(Some)
        }
    }
}

// A dynamic value carries no kind; it binds only with an explicit kind tag.
impl FieldValue for SqlValue {
    const KIND: Option<StorageKind> = None;
    const NULLABLE: bool = true;

    fn to_value(&self) -> SqlValue {
        self.clone()
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_decoding() {
        assert_eq!(i32::from_value(SqlValue::Int(42)).unwrap(), 42);
        assert_eq!(i64::from_value(SqlValue::Null).unwrap(), 0);
        assert_eq!(u8::from_value(SqlValue::Text("7".into())).unwrap(), 7);
        assert!(matches!(
            i8::from_value(SqlValue::Int(1000)),
            Err(ValueError::OutOfRange("i8"))
        ));
    }

    #[test]
    fn test_u64_uses_full_range() {
        let v = u64::MAX.to_value();
        assert_eq!(v, SqlValue::Int(-1));
        assert_eq!(u64::from_value(v).unwrap(), u64::MAX);
    }

    #[test]
    fn test_bool_from_numeric() {
        assert!(bool::from_value(SqlValue::Int(1)).unwrap());
        assert!(!bool::from_value(SqlValue::Text("false".into())).unwrap());
        assert!(bool::from_value(SqlValue::Blob(vec![1])).is_err());
    }

    #[test]
    fn test_option_null() {
        assert_eq!(Option::<String>::from_value(SqlValue::Null).unwrap(), None);
        assert_eq!(Some(3i16).to_value(), SqlValue::Int(3));
        assert_eq!(None::<i16>.to_value(), SqlValue::Null);
    }

    #[test]
    fn test_time_from_epoch_and_text() {
        let t = DateTime::<Utc>::from_value(SqlValue::Int(86_400)).unwrap();
        assert_eq!(t.timestamp(), 86_400);
        let t = DateTime::<Utc>::from_value(SqlValue::Text("1970-01-02T00:00:00Z".into())).unwrap();
        assert_eq!(t.timestamp(), 86_400);
    }
}
