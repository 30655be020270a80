//! Record schemas.
//!
//! A record type describes its columns once through [`Record::describe`]; the
//! resulting [`RecordSchema`] is cached per type for the life of the process
//! and drives SQL generation, row binding and automigrate.

mod cache;
mod field;
mod record;

pub use cache::bindings;
pub use field::FieldValue;
pub use record::{ColumnBinding, FieldOptions, Record, RecordSchema, SchemaBuilder};

use std::fmt;

/// Abstract storage kind of a column, independent of any dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Boolean.
    Bool,
    /// Signed integer.
    Int,
    /// Unsigned integer.
    Uint,
    /// Floating point.
    Float,
    /// Text.
    String,
    /// Timestamp.
    Time,
    /// Raw bytes.
    Bytes,
    /// Nested value stored as JSON text.
    Json,
}

impl StorageKind {
    /// Parses a kind tag such as `"int"` or `"json"`.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Some(Self::Bool),
            "int" | "integer" => Some(Self::Int),
            "uint" => Some(Self::Uint),
            "float" | "real" => Some(Self::Float),
            "string" | "text" => Some(Self::String),
            "time" | "datetime" => Some(Self::Time),
            "bytes" | "blob" => Some(Self::Bytes),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Returns the canonical tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::String => "string",
            Self::Time => "time",
            Self::Bytes => "bytes",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired definition of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Lowercased column name.
    pub name: String,
    /// Storage kind.
    pub kind: StorageKind,
    /// Declared size, e.g. the `N` of `varchar(N)`.
    pub size: Option<u32>,
    /// Stated nullability. `None` means the record does not care.
    pub not_null: Option<bool>,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Auto-increment integer key.
    pub auto_increment: bool,
    /// UNIQUE constraint.
    pub unique: bool,
    /// Whether an index should exist on this column.
    pub index: bool,
    /// Index class such as `UNIQUE`.
    pub index_class: Option<String>,
    /// Raw SQL default expression.
    pub default: Option<String>,
}

impl ColumnDef {
    /// Creates a column definition with no constraints.
    #[must_use]
    pub fn new(name: &str, kind: StorageKind) -> Self {
        Self {
            name: name.to_lowercase(),
            kind,
            size: None,
            not_null: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
            index: false,
            index_class: None,
            default: None,
        }
    }

    /// Returns true when the column is declared NOT NULL.
    #[must_use]
    pub fn is_not_null(&self) -> bool {
        self.not_null.unwrap_or(false)
    }
}

/// Desired schema of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Ordered columns.
    pub columns: Vec<ColumnDef>,
    /// Options appended after the column list of `CREATE TABLE`.
    pub options: Vec<String>,
    /// Table comment, for dialects that store one.
    pub comment: Option<String>,
}

impl TableSchema {
    /// Creates an empty table schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            options: Vec::new(),
            comment: None,
        }
    }

    /// Finds a column by exact name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the primary key columns in declaration order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.primary_key)
    }
}

/// Name of the index created for an indexed column.
#[must_use]
pub fn index_name(table: &str, column: &str) -> String {
    format!("idx_{table}_{column}")
}

/// Converts a type name such as `UserProfile` into `user_profile`.
#[must_use]
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || acronym_end {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Default table name for a Rust type: the snake-cased last path segment.
#[must_use]
pub fn default_table_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let last = base.rsplit("::").next().unwrap_or(base);
    to_snake_case(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserProfile;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("UserProfile"), "user_profile");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("Item2Price"), "item2_price");
    }

    #[test]
    fn test_default_table_name() {
        assert_eq!(default_table_name::<UserProfile>(), "user_profile");
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(StorageKind::parse("INTEGER"), Some(StorageKind::Int));
        assert_eq!(StorageKind::parse("json"), Some(StorageKind::Json));
        assert_eq!(StorageKind::parse("decimal"), None);
    }

    #[test]
    fn test_column_names_are_lowercased() {
        let col = ColumnDef::new("CreatedAt", StorageKind::Time);
        assert_eq!(col.name, "createdat");
        assert!(!col.is_not_null());
    }
}
