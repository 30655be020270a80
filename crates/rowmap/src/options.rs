//! Connection and per-call options.

use std::str::FromStr;
use std::time::Duration;

use rowmap_core::{OrderBy, Selector};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::{OrmError, Result};

/// Default cap on the number of rows a multi-row fetch returns.
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Options used when opening a [`Db`](crate::Db).
///
/// Deserializable from configuration; every field has a default.
///
/// ```
/// use rowmap::DbOptions;
///
/// let opts: DbOptions = serde_json::from_str(r#"{"dsn": "sqlite::memory:", "max_rows": 50}"#).unwrap();
/// assert_eq!(opts.dialect, "sqlite");
/// assert_eq!(opts.max_rows, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbOptions {
    /// Registered dialect name.
    pub dialect: String,
    /// Data source string.
    pub dsn: String,
    /// Warm connections the pool keeps open as a floor.
    ///
    /// Maps to the pool minimum; idle connections above it are closed by
    /// `idle_time`, not capped by this value.
    pub max_idle: Option<u32>,
    /// Maximum open connections.
    pub max_open: Option<u32>,
    /// Maximum lifetime of a connection, in seconds.
    pub conn_max_lifetime: Option<u64>,
    /// Idle time before a connection is closed, in seconds.
    pub idle_time: Option<u64>,
    /// Time to wait for a connection, in seconds.
    pub acquire_timeout: Option<u64>,
    /// Skip connecting at open time.
    pub without_ping: bool,
    /// Treat an empty single-row fetch as success.
    pub ignore_not_found: bool,
    /// Cap on rows returned by multi-row fetches.
    pub max_rows: usize,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            dialect: String::from("sqlite"),
            dsn: String::from("sqlite::memory:"),
            max_idle: None,
            max_open: None,
            conn_max_lifetime: None,
            idle_time: None,
            acquire_timeout: None,
            without_ping: false,
            ignore_not_found: false,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl DbOptions {
    /// Options for `dialect` at `dsn`, everything else default.
    #[must_use]
    pub fn new(dialect: impl Into<String>, dsn: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    /// Sets the number of warm connections kept open.
    #[must_use]
    pub const fn with_max_idle(mut self, n: u32) -> Self {
        self.max_idle = Some(n);
        self
    }

    /// Sets the maximum number of open connections.
    #[must_use]
    pub const fn with_max_open(mut self, n: u32) -> Self {
        self.max_open = Some(n);
        self
    }

    /// Sets the maximum connection lifetime.
    #[must_use]
    pub const fn with_conn_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.conn_max_lifetime = Some(lifetime.as_secs());
        self
    }

    /// Sets the idle time limit.
    #[must_use]
    pub const fn with_idle_time(mut self, idle: Duration) -> Self {
        self.idle_time = Some(idle.as_secs());
        self
    }

    /// Sets the connection acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout.as_secs());
        self
    }

    /// Opens lazily instead of connecting up front.
    #[must_use]
    pub const fn without_ping(mut self) -> Self {
        self.without_ping = true;
        self
    }

    /// Makes empty single-row fetches succeed without touching the destination.
    #[must_use]
    pub const fn with_ignore_not_found(mut self) -> Self {
        self.ignore_not_found = true;
        self
    }

    /// Sets the cap on rows returned by multi-row fetches.
    #[must_use]
    pub const fn with_max_rows(mut self, n: usize) -> Self {
        self.max_rows = n;
        self
    }

    /// Checks the options for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.dialect.trim().is_empty() {
            return Err(OrmError::Validation("dialect is required".to_string()));
        }
        if self.dsn.trim().is_empty() {
            return Err(OrmError::Validation("dsn is required".to_string()));
        }
        if self.max_rows == 0 {
            return Err(OrmError::Validation("max_rows must be positive".to_string()));
        }
        if self.max_open == Some(0) {
            return Err(OrmError::Validation("max_open must be positive".to_string()));
        }
        if let (Some(idle), Some(open)) = (self.max_idle, self.max_open) {
            if idle > open {
                return Err(OrmError::Validation(format!(
                    "max_idle ({idle}) exceeds max_open ({open})"
                )));
            }
        }
        Ok(())
    }

    /// Whether the data source is a private in-memory database.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.dsn.contains(":memory:") || self.dsn.contains("mode=memory")
    }

    /// Connection options for the data source.
    pub fn connect_options(&self) -> Result<SqliteConnectOptions> {
        Ok(SqliteConnectOptions::from_str(&self.dsn)?.create_if_missing(true))
    }

    /// Pool options derived from the limits.
    ///
    /// Every connection to an in-memory database sees its own empty database,
    /// so such pools default to one connection that is never recycled.
    #[must_use]
    pub fn pool_options(&self) -> SqlitePoolOptions {
        let memory = self.is_memory();
        let mut pool = SqlitePoolOptions::new();
        match self.max_open {
            Some(n) => pool = pool.max_connections(n),
            None if memory => pool = pool.max_connections(1),
            None => {}
        }
        if let Some(n) = self.max_idle {
            pool = pool.min_connections(n);
        }
        match self.conn_max_lifetime {
            Some(secs) => pool = pool.max_lifetime(Duration::from_secs(secs)),
            None if memory => pool = pool.max_lifetime(None),
            None => {}
        }
        match self.idle_time {
            Some(secs) => pool = pool.idle_timeout(Duration::from_secs(secs)),
            None if memory => pool = pool.idle_timeout(None),
            None => {}
        }
        if let Some(secs) = self.acquire_timeout {
            pool = pool.acquire_timeout(Duration::from_secs(secs));
        }
        pool
    }
}

/// Options for a single call: table override, filter, projection, ordering
/// and paging.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Table name overriding the record's own.
    pub table: Option<String>,
    /// Extra `CREATE TABLE` options used by automigrate.
    pub table_options: Vec<String>,
    /// Row filter.
    pub selector: Option<Selector>,
    /// Projected columns; all bound columns when empty.
    pub cols: Vec<String>,
    /// Ordering terms.
    pub order_by: Vec<OrderBy>,
    /// Rows to skip.
    pub offset: Option<u64>,
    /// Rows to return.
    pub limit: Option<u64>,
    /// Treat an empty single-row fetch as success for this call.
    pub ignore_not_found: bool,
}

impl QueryOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Adds `CREATE TABLE` options for automigrate.
    #[must_use]
    pub fn with_table_options<S: AsRef<str>>(mut self, options: &[S]) -> Self {
        self.table_options
            .extend(options.iter().map(|o| o.as_ref().to_string()));
        self
    }

    /// Sets the row filter.
    #[must_use]
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Parses and sets the row filter, e.g. `"status=active,age>18"`.
    pub fn with_selector_str(self, selector: &str) -> Result<Self> {
        Ok(self.with_selector(Selector::parse(selector)?))
    }

    /// Restricts the projected columns.
    #[must_use]
    pub fn with_cols<S: AsRef<str>>(mut self, cols: &[S]) -> Self {
        self.cols = cols.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Sets ordering from specs such as `"-created_at"` or `"name asc"`.
    #[must_use]
    pub fn with_order_by<S: AsRef<str>>(mut self, specs: &[S]) -> Self {
        self.order_by = specs.iter().map(|s| OrderBy::parse(s.as_ref())).collect();
        self
    }

    /// Sets paging.
    #[must_use]
    pub const fn with_limit(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Makes an empty single-row fetch succeed for this call.
    #[must_use]
    pub const fn with_ignore_not_found(mut self) -> Self {
        self.ignore_not_found = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = DbOptions::default();
        assert_eq!(opts.max_rows, DEFAULT_MAX_ROWS);
        assert!(opts.is_memory());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(DbOptions::new("", "x").validate().is_err());
        assert!(DbOptions::new("sqlite", "x").with_max_rows(0).validate().is_err());
        assert!(DbOptions::new("sqlite", "x")
            .with_max_idle(5)
            .with_max_open(2)
            .validate()
            .is_err());
    }

    #[test]
    fn test_pool_limits() {
        let pool = DbOptions::default().pool_options();
        assert_eq!(pool.get_max_connections(), 1);
        assert_eq!(pool.get_idle_timeout(), None);

        let pool = DbOptions::new("sqlite", "sqlite:app.db")
            .with_max_idle(2)
            .with_max_open(4)
            .pool_options();
        assert_eq!(pool.get_min_connections(), 2);
        assert_eq!(pool.get_max_connections(), 4);
    }

    #[test]
    fn test_deserialize_partial() {
        let opts: DbOptions =
            serde_json::from_str(r#"{"dialect": "sqlite3", "dsn": "sqlite:app.db", "ignore_not_found": true}"#)
                .unwrap();
        assert_eq!(opts.dialect, "sqlite3");
        assert!(opts.ignore_not_found);
        assert_eq!(opts.max_rows, DEFAULT_MAX_ROWS);
        assert!(!opts.is_memory());
    }

    #[test]
    fn test_query_options() {
        let opts = QueryOptions::new()
            .with_selector_str("name=x")
            .unwrap()
            .with_order_by(&["-id"])
            .with_limit(10, 5);
        assert_eq!(opts.order_by, vec![OrderBy::desc("id")]);
        assert_eq!((opts.offset, opts.limit), (Some(10), Some(5)));
        assert!(QueryOptions::new().with_selector_str("a in b").is_err());
    }
}
