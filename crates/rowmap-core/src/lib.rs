//! # rowmap-core
//!
//! The I/O-free half of rowmap: record schemas, filter selectors, SQL
//! generation and `CREATE TABLE` rewriting.
//!
//! This crate provides:
//! - [`Record`] and [`SchemaBuilder`] for describing how a struct maps to a
//!   table, with a process-wide binding cache ([`bindings`])
//! - [`Selector`] filter trees, buildable in code or parsed from strings
//! - [`Select`], [`insert_sql`], [`update_sql`] and [`Delete`] for
//!   parameterized SQL
//! - [`DdlDocument`] for editing stored table definitions
//!
//! ## Describing a record
//!
//! ```
//! use rowmap_core::{bindings, Record};
//!
//! #[derive(Debug, Default, Record)]
//! #[record(table = "users")]
//! struct User {
//!     #[column(primary_key, auto_increment)]
//!     id: i64,
//!     #[column(size = 64, not_null, index)]
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! let schema = bindings::<User>();
//! assert_eq!(schema.table_name(), "users");
//! assert_eq!(schema.column_names(), vec!["id", "name", "email"]);
//! ```

extern crate self as rowmap_core;

pub mod builder;
pub mod ddl;
mod error;
pub mod filter;
pub mod schema;
pub mod value;

pub use builder::{insert_sql, quote_ident, update_sql, Delete, ListSql, OrderBy, OrderDirection, Select};
pub use ddl::DdlDocument;
pub use error::{Error, Result, ValueError};
pub use filter::{CompareOp, Selector};
pub use rowmap_derive::Record;
pub use schema::{
    bindings, index_name, ColumnBinding, ColumnDef, FieldOptions, FieldValue, Record, RecordSchema,
    SchemaBuilder, StorageKind, TableSchema,
};
pub use value::{SqlValue, ToSqlValue};
