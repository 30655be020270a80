//! Database handles, transactions and the record operations they share.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rowmap_core::builder::validate_columns;
use rowmap_core::value::format_time;
use rowmap_core::{
    bindings, insert_sql, update_sql, Delete, Record, RecordSchema, Select, Selector, SqlValue,
};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteQueryResult};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::dialect::{Driver, DriverRegistry, NoneDriver};
use crate::error::{OrmError, Result};
use crate::migrate::{automigrate, MigrationStep};
use crate::options::{DbOptions, QueryOptions};
use crate::rows::Rows;
use crate::script::split_script;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_param(query: SqliteQuery<'_>, value: SqlValue) -> SqliteQuery<'_> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
        SqlValue::Time(t) => query.bind(format_time(&t)),
    }
}

fn prepare(sql: &str, params: Vec<SqlValue>) -> SqliteQuery<'_> {
    debug!(sql, params = params.len(), "executing");
    params.into_iter().fold(sqlx::query(sql), bind_param)
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Rows changed by the statement.
    pub rows_affected: u64,
    /// Row id of the last inserted row.
    pub last_insert_id: i64,
}

impl From<SqliteQueryResult> for ExecResult {
    fn from(result: SqliteQueryResult) -> Self {
        Self {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        }
    }
}

fn table_for<'a, T>(schema: &'a RecordSchema<T>, opts: &'a QueryOptions) -> &'a str {
    opts.table.as_deref().unwrap_or_else(|| schema.table_name())
}

fn check_selector<T>(schema: &RecordSchema<T>, table: &str, selector: &Selector) -> Result<()> {
    validate_columns(table, &schema.column_names(), selector.columns())?;
    Ok(())
}

/// Equality on the primary key, when every key field is set.
fn key_selector<T>(schema: &RecordSchema<T>, record: &T) -> Result<Option<Selector>> {
    let mut keys = Vec::new();
    for binding in schema.primary_keys() {
        let value = binding.value(record)?;
        if value.is_zero() {
            return Ok(None);
        }
        keys.push(Selector::eq(binding.name(), value));
    }
    Ok(keys.into_iter().reduce(Selector::and))
}

/// The SELECT for `opts`, after checking every referenced column.
fn select_for<T>(schema: &RecordSchema<T>, opts: &QueryOptions) -> Result<Select> {
    let table = table_for(schema, opts);
    let known = schema.column_names();
    validate_columns(table, &known, opts.cols.iter().map(String::as_str))?;
    validate_columns(table, &known, opts.order_by.iter().map(|o| o.column.as_str()))?;
    if let Some(selector) = &opts.selector {
        check_selector(schema, table, selector)?;
    }
    let select = if opts.cols.is_empty() {
        Select::from(table).columns(known.as_slice())
    } else {
        Select::from(table).columns(opts.cols.as_slice())
    };
    Ok(select
        .filter(opts.selector.clone())
        .order_by(opts.order_by.clone())
        .paginate(opts.offset, opts.limit))
}

/// Record operations shared by [`Db`] and [`Tx`].
#[async_trait]
pub trait Session: Send {
    /// Options the handle was opened with.
    fn options(&self) -> &DbOptions;

    /// Dialect driver of the handle.
    fn driver(&self) -> Arc<dyn Driver>;

    /// Executes a statement that returns no rows.
    async fn exec(&mut self, sql: &str, params: Vec<SqlValue>) -> Result<ExecResult>;

    /// Starts a query; rows are fetched as the result is consumed.
    fn query<'s>(&'s mut self, sql: &'s str, params: Vec<SqlValue>) -> Rows<'s>;

    /// Inserts a record.
    ///
    /// Columns the driver excludes, such as an unset auto-increment key, are
    /// left to the database.
    async fn insert<T: Record>(&mut self, record: &T, opts: &QueryOptions) -> Result<ExecResult> {
        let schema = bindings::<T>();
        let driver = self.driver();
        let values: Vec<(&str, SqlValue)> = schema
            .values(record)?
            .into_iter()
            .filter(|(def, value)| driver.insertable(def, value))
            .map(|(def, value)| (def.name.as_str(), value))
            .collect();
        let (sql, params) = insert_sql(table_for(&schema, opts), &values);
        self.exec(&sql, params).await
    }

    /// Fetches one record into `dest`.
    ///
    /// Rows are matched by the selector, or by the primary key already set
    /// on `dest` when there is no selector.
    async fn get<T: Record>(&mut self, dest: &mut T, opts: &QueryOptions) -> Result<()> {
        let schema = bindings::<T>();
        let mut select = select_for(&schema, opts)?;
        if opts.selector.is_none() {
            select = select.filter(key_selector(&schema, dest)?);
        }
        let (sql, params) = select.build();
        let ignore = opts.ignore_not_found || self.options().ignore_not_found;
        self.query(&sql, params)
            .ignore_not_found(ignore)
            .row(dest)
            .await
    }

    /// Appends the matching records to `dest`, up to the row cap.
    async fn list<T: Record>(&mut self, dest: &mut Vec<T>, opts: &QueryOptions) -> Result<()> {
        let schema = bindings::<T>();
        let (sql, params) = select_for(&schema, opts)?.build();
        self.query(&sql, params).rows(dest).await
    }

    /// Like [`Session::list`], also returning the number of rows matching
    /// the selector regardless of paging.
    async fn list_with_total<T: Record>(
        &mut self,
        dest: &mut Vec<T>,
        opts: &QueryOptions,
    ) -> Result<i64> {
        let schema = bindings::<T>();
        let list = select_for(&schema, opts)?.build_list();
        let mut total = 0_i64;
        self.query(&list.count, list.params.clone())
            .scalar(&mut total)
            .await?;
        self.query(&list.select, list.params).rows(dest).await?;
        Ok(total)
    }

    /// Counts the records matching the selector.
    async fn count<T: Record>(&mut self, opts: &QueryOptions) -> Result<i64> {
        let schema = bindings::<T>();
        let (sql, params) = select_for(&schema, opts)?.build_count();
        let mut total = 0_i64;
        self.query(&sql, params).scalar(&mut total).await?;
        Ok(total)
    }

    /// Updates the non-zero, non-key columns of a record.
    ///
    /// Rows are matched by the selector, or by the record's primary key.
    async fn update<T: Record>(&mut self, record: &T, opts: &QueryOptions) -> Result<ExecResult> {
        let schema = bindings::<T>();
        let table = table_for(&schema, opts);
        let selector = match &opts.selector {
            Some(selector) => {
                check_selector(&schema, table, selector)?;
                selector.clone()
            }
            None => key_selector(&schema, record)?.ok_or_else(|| {
                OrmError::Validation(format!(
                    "update of `{table}` needs a selector or a primary key value"
                ))
            })?,
        };
        let set: Vec<(&str, SqlValue)> = schema
            .values(record)?
            .into_iter()
            .filter(|(def, value)| !def.primary_key && !def.auto_increment && !value.is_zero())
            .map(|(def, value)| (def.name.as_str(), value))
            .collect();
        let (sql, params) = update_sql(table, &set, &selector)?;
        self.exec(&sql, params).await
    }

    /// Deletes the rows matched by the selector, or by the record's primary
    /// key.
    ///
    /// Fails rather than deleting every row when neither yields a condition;
    /// use [`Session::delete_all`] for that.
    async fn delete<T: Record>(&mut self, record: &T, opts: &QueryOptions) -> Result<ExecResult> {
        let schema = bindings::<T>();
        let table = table_for(&schema, opts);
        let selector = match &opts.selector {
            Some(selector) => {
                check_selector(&schema, table, selector)?;
                Some(selector.clone())
            }
            None => key_selector(&schema, record)?,
        };
        let (sql, params) = Delete::from(table).filter(selector).build()?;
        self.exec(&sql, params).await
    }

    /// Deletes every row of the record's table.
    async fn delete_all<T: Record>(&mut self, opts: &QueryOptions) -> Result<ExecResult> {
        let schema = bindings::<T>();
        let sql = Delete::from(table_for(&schema, opts)).all().build();
        self.exec(&sql, Vec::new()).await
    }
}

/// A pooled database handle.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
    options: Arc<DbOptions>,
    driver: Arc<dyn Driver>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("options", &self.options)
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

impl Db {
    /// Opens a database and binds the driver registered for its dialect.
    ///
    /// A dialect with no registered driver still opens; DDL and
    /// introspection then fail with [`OrmError::Unsupported`].
    pub async fn open(options: DbOptions, registry: &DriverRegistry) -> Result<Self> {
        options.validate()?;
        let connect = options.connect_options()?;
        let pool_options = options.pool_options();
        let pool = if options.without_ping {
            pool_options.connect_lazy_with(connect)
        } else {
            pool_options.connect_with(connect).await?
        };

        let options = Arc::new(options);
        let driver = match registry.get(&options.dialect) {
            Ok(factory) => factory(pool.clone(), Arc::clone(&options)),
            Err(err) => {
                warn!(error = %err, "falling back to a driver without DDL support");
                Arc::new(NoneDriver)
            }
        };
        info!(dialect = %options.dialect, driver = driver.name(), "database opened");
        Ok(Self {
            pool,
            options,
            driver,
        })
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection of the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Starts a transaction.
    pub async fn begin(&self) -> Result<Tx> {
        Ok(Tx {
            tx: self.pool.begin().await?,
            options: Arc::clone(&self.options),
            driver: Arc::clone(&self.driver),
        })
    }

    /// Brings the record's table in line with its schema.
    ///
    /// `opts` may override the table name and add table options.
    pub async fn automigrate<T: Record>(&self, opts: &QueryOptions) -> Result<Vec<MigrationStep>> {
        let mut table = bindings::<T>().table().clone();
        if let Some(name) = &opts.table {
            table.name.clone_from(name);
        }
        table.options.extend(opts.table_options.iter().cloned());
        automigrate(self.driver.as_ref(), &table).await
    }

    /// Drops the record's table if it exists.
    pub async fn drop_table<T: Record>(&self, opts: &QueryOptions) -> Result<()> {
        let schema = bindings::<T>();
        self.driver.drop_table(table_for(&schema, opts)).await
    }

    /// Runs a bulk script in one transaction and returns the number of
    /// statements executed. Nothing is committed unless every statement
    /// succeeds.
    pub async fn exec_script(&self, script: &[u8]) -> Result<usize> {
        let statements = split_script(script)?;
        let mut tx = self.pool.begin().await?;
        for sql in &statements {
            debug!(sql = %sql, "executing");
            sqlx::query(sql)
                .execute(&mut *tx)
                .await
                .map_err(OrmError::execution(sql))?;
        }
        tx.commit().await?;
        info!(statements = statements.len(), "script executed");
        Ok(statements.len())
    }
}

#[async_trait]
impl Session for Db {
    fn options(&self) -> &DbOptions {
        &self.options
    }

    fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    async fn exec(&mut self, sql: &str, params: Vec<SqlValue>) -> Result<ExecResult> {
        let result = prepare(sql, params)
            .execute(&self.pool)
            .await
            .map_err(OrmError::execution(sql))?;
        Ok(result.into())
    }

    fn query<'s>(&'s mut self, sql: &'s str, params: Vec<SqlValue>) -> Rows<'s> {
        let stream = prepare(sql, params).fetch(&self.pool);
        Rows::new(
            stream,
            sql,
            self.options.max_rows,
            self.options.ignore_not_found,
        )
    }
}

/// A transaction. Rolled back when dropped without [`Tx::commit`].
pub struct Tx {
    tx: Transaction<'static, Sqlite>,
    options: Arc<DbOptions>,
    driver: Arc<dyn Driver>,
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

impl Tx {
    /// Commits the transaction.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Rolls the transaction back.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Session for Tx {
    fn options(&self) -> &DbOptions {
        &self.options
    }

    fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    async fn exec(&mut self, sql: &str, params: Vec<SqlValue>) -> Result<ExecResult> {
        let result = prepare(sql, params)
            .execute(&mut *self.tx)
            .await
            .map_err(OrmError::execution(sql))?;
        Ok(result.into())
    }

    fn query<'s>(&'s mut self, sql: &'s str, params: Vec<SqlValue>) -> Rows<'s> {
        let stream = prepare(sql, params).fetch(&mut *self.tx);
        Rows::new(
            stream,
            sql,
            self.options.max_rows,
            self.options.ignore_not_found,
        )
    }
}
