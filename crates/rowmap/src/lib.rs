//! Record mapping and automigrate over sqlx.
//!
//! Records describe their columns through [`Record`] (usually derived).
//! A [`Db`] opened with a dialect from a [`DriverRegistry`] inserts, fetches,
//! lists, updates and deletes records, and [`Db::automigrate`] reconciles the
//! live table with the record's schema.
//!
//! ```no_run
//! use rowmap::{Db, DbOptions, DriverRegistry, QueryOptions, Record, Session};
//!
//! #[derive(Debug, Default, Record)]
//! #[record(table = "users")]
//! struct User {
//!     #[column(primary_key, auto_increment)]
//!     id: i64,
//!     #[column(size = 64, not_null)]
//!     name: String,
//! }
//!
//! # async fn run() -> rowmap::Result<()> {
//! let mut db = Db::open(DbOptions::default(), &DriverRegistry::with_builtins()).await?;
//! db.automigrate::<User>(&QueryOptions::new()).await?;
//! db.insert(&User { id: 0, name: "ada".into() }, &QueryOptions::new()).await?;
//!
//! let mut user = User::default();
//! db.get(&mut user, &QueryOptions::new().with_selector_str("name=ada")?).await?;
//! # Ok(())
//! # }
//! ```

pub mod dialect;
mod db;
mod error;
pub mod migrate;
mod options;
mod rows;
mod script;

pub use db::{Db, ExecResult, Session, Tx};
pub use dialect::{ColumnInfo, Driver, DriverFactory, DriverRegistry, NoneDriver, SqliteDriver};
pub use error::{OrmError, Result};
pub use migrate::{automigrate, MigrationStep};
pub use options::{DbOptions, QueryOptions, DEFAULT_MAX_ROWS};
pub use rows::{RowIter, Rows};
pub use script::split_script;

pub use rowmap_core::{
    bindings, ColumnDef, OrderBy, Record, RecordSchema, SchemaBuilder, Selector, SqlValue,
    StorageKind, TableSchema,
};
