//! Database dialect drivers.
//!
//! A driver knows how to map storage kinds to native column types, how to
//! introspect the live schema, and how to issue DDL. Drivers are created
//! through a [`DriverRegistry`] when a [`Db`](crate::Db) is opened.

mod sqlite;

pub use sqlite::SqliteDriver;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rowmap_core::{ColumnDef, SqlValue, StorageKind, TableSchema};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{OrmError, Result};
use crate::options::DbOptions;

/// A column as it exists in the live database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name as stored.
    pub name: String,
    /// Declared type, e.g. `varchar(10)`.
    pub data_type: String,
    /// Size parsed from the declared type.
    pub size: Option<u32>,
    /// Whether the column is declared NOT NULL.
    pub not_null: bool,
}

/// Per-database type mapping, introspection and DDL.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Dialect name.
    fn name(&self) -> &'static str;

    /// Native type token for a storage kind.
    fn driver_data_type(&self, column: &ColumnDef) -> Result<String>;

    /// Native type plus column constraints, as used in `CREATE TABLE`.
    fn full_data_type(&self, column: &ColumnDef) -> Result<String>;

    /// Whether `value` should be sent for `column` in an INSERT.
    fn insertable(&self, column: &ColumnDef, value: &SqlValue) -> bool {
        !(column.auto_increment && value.is_zero())
    }

    /// Whether the table exists.
    async fn has_table(&self, table: &str) -> Result<bool>;

    /// Whether the column exists on the table.
    async fn has_column(&self, table: &str, column: &str) -> Result<bool>;

    /// Whether the index exists on the table.
    async fn has_index(&self, table: &str, index: &str) -> Result<bool>;

    /// Columns of an existing table, in table order.
    async fn column_types(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Creates the table and its indexes.
    async fn create_table(&self, schema: &TableSchema) -> Result<()>;

    /// Drops the table if it exists.
    async fn drop_table(&self, table: &str) -> Result<()>;

    /// Adds a column.
    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()>;

    /// Drops a column.
    async fn drop_column(&self, table: &str, column: &str) -> Result<()>;

    /// Changes the definition of an existing column.
    async fn alter_column(&self, table: &str, column: &ColumnDef) -> Result<()>;

    /// Creates the index described by an indexed column.
    async fn create_index(&self, table: &str, column: &ColumnDef) -> Result<()>;

    /// Drops an index by name.
    async fn drop_index(&self, table: &str, index: &str) -> Result<()>;

    /// User tables of the current database.
    async fn tables(&self) -> Result<Vec<String>>;

    /// Name of the current database.
    async fn current_database(&self) -> Result<String>;

    /// The stored `CREATE TABLE` statement of a table.
    async fn raw_ddl(&self, table: &str) -> Result<String>;
}

/// Creates a driver bound to a pool.
pub type DriverFactory = fn(SqlitePool, Arc<DbOptions>) -> Arc<dyn Driver>;

/// Dialect name to driver factory.
///
/// Built once at startup and passed to [`Db::open`](crate::Db::open).
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in drivers (`sqlite`, `sqlite3`).
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut factories: HashMap<String, DriverFactory> = HashMap::new();
        factories.insert("sqlite".to_string(), SqliteDriver::factory);
        factories.insert("sqlite3".to_string(), SqliteDriver::factory);
        Self { factories }
    }

    /// Registers a factory under `name`.
    ///
    /// Registering a name twice is an error.
    pub fn register(&mut self, name: &str, factory: DriverFactory) -> Result<()> {
        if self.factories.contains_key(name) {
            return Err(OrmError::DuplicateDriver(name.to_string()));
        }
        info!(dialect = name, "registered driver");
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// Looks up the factory registered under `name`.
    pub fn get(&self, name: &str) -> Result<DriverFactory> {
        self.factories
            .get(name)
            .copied()
            .ok_or_else(|| OrmError::UnknownDialect(name.to_string()))
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Driver used when the dialect has no registered factory.
///
/// Sessions still work; every DDL or introspection call is
/// [`OrmError::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneDriver;

impl NoneDriver {
    fn unsupported<T>(operation: &str) -> Result<T> {
        Err(OrmError::Unsupported(format!(
            "{operation} is not available without a dialect driver"
        )))
    }
}

#[async_trait]
impl Driver for NoneDriver {
    fn name(&self) -> &'static str {
        "none"
    }

    fn driver_data_type(&self, column: &ColumnDef) -> Result<String> {
        Self::unsupported(&format!("type mapping of `{}`", column.name))
    }

    fn full_data_type(&self, column: &ColumnDef) -> Result<String> {
        Self::unsupported(&format!("type mapping of `{}`", column.name))
    }

    async fn has_table(&self, _table: &str) -> Result<bool> {
        Self::unsupported("has_table")
    }

    async fn has_column(&self, _table: &str, _column: &str) -> Result<bool> {
        Self::unsupported("has_column")
    }

    async fn has_index(&self, _table: &str, _index: &str) -> Result<bool> {
        Self::unsupported("has_index")
    }

    async fn column_types(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
        Self::unsupported("column_types")
    }

    async fn create_table(&self, _schema: &TableSchema) -> Result<()> {
        Self::unsupported("create_table")
    }

    async fn drop_table(&self, _table: &str) -> Result<()> {
        Self::unsupported("drop_table")
    }

    async fn add_column(&self, _table: &str, _column: &ColumnDef) -> Result<()> {
        Self::unsupported("add_column")
    }

    async fn drop_column(&self, _table: &str, _column: &str) -> Result<()> {
        Self::unsupported("drop_column")
    }

    async fn alter_column(&self, _table: &str, _column: &ColumnDef) -> Result<()> {
        Self::unsupported("alter_column")
    }

    async fn create_index(&self, _table: &str, _column: &ColumnDef) -> Result<()> {
        Self::unsupported("create_index")
    }

    async fn drop_index(&self, _table: &str, _index: &str) -> Result<()> {
        Self::unsupported("drop_index")
    }

    async fn tables(&self) -> Result<Vec<String>> {
        Self::unsupported("tables")
    }

    async fn current_database(&self) -> Result<String> {
        Self::unsupported("current_database")
    }

    async fn raw_ddl(&self, _table: &str) -> Result<String> {
        Self::unsupported("raw_ddl")
    }
}

/// Zero literal of a storage kind, used to fill NOT NULL columns on copy.
pub(crate) const fn zero_literal(kind: StorageKind) -> &'static str {
    match kind {
        StorageKind::Bool | StorageKind::Int | StorageKind::Uint => "0",
        StorageKind::Float => "0.0",
        StorageKind::String | StorageKind::Json => "''",
        StorageKind::Time => "'1970-01-01T00:00:00.000000000Z'",
        StorageKind::Bytes => "X''",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_factory(_pool: SqlitePool, _options: Arc<DbOptions>) -> Arc<dyn Driver> {
        Arc::new(NoneDriver)
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = DriverRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["sqlite", "sqlite3"]);
        registry.register("fake", fake_factory).unwrap();
        let err = registry.register("fake", fake_factory).unwrap_err();
        assert!(matches!(err, OrmError::DuplicateDriver(name) if name == "fake"));
        assert!(matches!(registry.register("sqlite", fake_factory), Err(OrmError::DuplicateDriver(_))));
    }

    #[test]
    fn test_registry_unknown() {
        let registry = DriverRegistry::new();
        assert!(matches!(registry.get("mysql"), Err(OrmError::UnknownDialect(_))));
    }

    #[test]
    fn test_insertable_skips_zero_auto_increment() {
        let mut id = ColumnDef::new("id", StorageKind::Int);
        id.auto_increment = true;
        assert!(!NoneDriver.insertable(&id, &SqlValue::Int(0)));
        assert!(NoneDriver.insertable(&id, &SqlValue::Int(7)));
        let name = ColumnDef::new("name", StorageKind::String);
        assert!(NoneDriver.insertable(&name, &SqlValue::Text(String::new())));
    }
}
