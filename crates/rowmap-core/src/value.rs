//! SQL values and parameter handling.
//!
//! Every argument produced by the SQL generator and every cell decoded from a
//! result row passes through [`SqlValue`].

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::ValueError;

/// A SQL value that can be used as a parameter or read back from a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Timestamp value, bound as RFC 3339 text.
    Time(DateTime<Utc>),
}

impl SqlValue {
    /// Returns true for NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true when the value is the zero value of its type.
    ///
    /// Zero values are left out of UPDATE statements and, for auto-increment
    /// columns, out of INSERT statements.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(n) => *n == 0,
            Self::Float(f) => *f == 0.0,
            Self::Text(s) => s.is_empty(),
            Self::Blob(b) => b.is_empty(),
            Self::Time(t) => t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0,
        }
    }

    /// Name of the storage class, used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Time(_) => "time",
        }
    }

    /// Returns the parameter placeholder.
    #[must_use]
    pub const fn placeholder() -> &'static str {
        "?"
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! int_to_sql {
    ($($ty:ty),*) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )*
    };
}

int_to_sql!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Time(self)
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        self.map_or(SqlValue::Null, ToSqlValue::to_sql_value)
    }
}

/// Renders a timestamp the way it is stored in text columns.
///
/// The fraction always has nine digits so stored values order correctly
/// when compared as text.
#[must_use]
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses a stored timestamp.
///
/// Accepts RFC 3339 as well as the `YYYY-MM-DD HH:MM:SS[.f]` form produced by
/// `CURRENT_TIMESTAMP` defaults, which is taken as UTC.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, ValueError> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(ValueError::Time(s.to_string()))
}

/// Converts seconds since the Unix epoch into a timestamp.
pub fn time_from_epoch(secs: i64) -> Result<DateTime<Utc>, ValueError> {
    DateTime::from_timestamp(secs, 0).ok_or(ValueError::OutOfRange("timestamp"))
}
