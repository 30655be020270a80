//! SQLite driver.
//!
//! SQLite cannot alter or drop a column that carries constraints, so those
//! changes rebuild the table: the stored `CREATE TABLE` text is rewritten,
//! a copy of the table is created under a temporary name, the rows are
//! copied over, and the copy replaces the original. The whole sequence runs
//! in one transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rowmap_core::{index_name, quote_ident, ColumnDef, DdlDocument, StorageKind, TableSchema};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{zero_literal, ColumnInfo, Driver};
use crate::error::{OrmError, Result};
use crate::options::DbOptions;

/// Driver for SQLite databases.
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    /// Creates a driver over `pool`.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Factory registered under `sqlite` and `sqlite3`.
    pub fn factory(pool: SqlitePool, _options: Arc<DbOptions>) -> Arc<dyn Driver> {
        Arc::new(Self::new(pool))
    }

    fn column_clause(&self, column: &ColumnDef) -> Result<String> {
        Ok(format!(
            "{} {}",
            quote_ident(&column.name),
            self.full_data_type(column)?
        ))
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql, "executing");
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(OrmError::execution(sql))?;
        Ok(())
    }

    async fn count(&self, sql: &str, args: &[&str]) -> Result<i64> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        for arg in args {
            query = query.bind(arg.to_string());
        }
        query
            .fetch_one(&self.pool)
            .await
            .map_err(OrmError::execution(sql))
    }

    /// Rebuilds `table` after applying `mutate` to its stored definition.
    ///
    /// Columns present both before and after the mutation are copied;
    /// `copy_exprs` overrides the SELECT expression used for a column
    /// (lowercased name to SQL expression) and may name new columns.
    async fn recreate<F>(
        &self,
        table: &str,
        mutate: F,
        copy_exprs: HashMap<String, String>,
    ) -> Result<()>
    where
        F: FnOnce(&mut DdlDocument) -> Result<()> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let raw = stored_ddl(&mut tx, table).await?;
        let mut doc = DdlDocument::parse(&raw)?;
        let before = doc.columns();
        mutate(&mut doc)?;
        let after = doc.columns();

        let temp = format!("{table}__temp");
        if !doc.rename_table(&temp) {
            return Err(OrmError::DdlParse {
                offset: 0,
                message: format!("no table name in `{raw}`"),
            });
        }

        let indexes = stored_indexes(&mut tx, table).await?;

        run(&mut tx, &doc.compile()).await?;

        let mut targets = Vec::new();
        let mut sources = Vec::new();
        for column in &after {
            let key = column.to_lowercase();
            let existed = before.iter().any(|b| b.eq_ignore_ascii_case(column));
            match copy_exprs.get(&key) {
                Some(expr) => sources.push(expr.clone()),
                None if existed => sources.push(quote_ident(column)),
                None => continue,
            }
            targets.push(quote_ident(column));
        }
        if !targets.is_empty() {
            let copy = format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                quote_ident(&temp),
                targets.join(", "),
                sources.join(", "),
                quote_ident(table)
            );
            run(&mut tx, &copy).await?;
        }

        run(&mut tx, &format!("DROP TABLE {}", quote_ident(table))).await?;
        run(
            &mut tx,
            &format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_ident(&temp),
                quote_ident(table)
            ),
        )
        .await?;

        for (name, sql, columns) in indexes {
            let survives = columns
                .iter()
                .all(|c| after.iter().any(|a| a.eq_ignore_ascii_case(c)));
            if survives {
                run(&mut tx, &sql).await?;
            } else {
                info!(table, index = %name, "index dropped with its column");
            }
        }

        tx.commit().await?;
        info!(table, "table recreated");
        Ok(())
    }
}

async fn run(conn: &mut SqliteConnection, sql: &str) -> Result<()> {
    debug!(sql, "executing");
    sqlx::query(sql)
        .execute(&mut *conn)
        .await
        .map_err(OrmError::execution(sql))?;
    Ok(())
}

const STORED_DDL: &str = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?";

async fn stored_ddl(conn: &mut SqliteConnection, table: &str) -> Result<String> {
    sqlx::query_scalar::<_, String>(STORED_DDL)
        .bind(table)
        .fetch_optional(&mut *conn)
        .await
        .map_err(OrmError::execution(STORED_DDL))?
        .ok_or_else(|| OrmError::Validation(format!("table `{table}` does not exist")))
}

/// Explicitly created indexes of a table: name, stored SQL and columns.
async fn stored_indexes(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<(String, String, Vec<String>)>> {
    const INDEXES: &str = "SELECT name, sql FROM sqlite_master \
        WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL";
    const INDEX_COLUMNS: &str = "SELECT name FROM pragma_index_info(?) ORDER BY seqno";

    let rows: Vec<(String, String)> = sqlx::query_as(INDEXES)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(OrmError::execution(INDEXES))?;

    let mut indexes = Vec::with_capacity(rows.len());
    for (name, sql) in rows {
        let columns: Vec<Option<String>> = sqlx::query_scalar(INDEX_COLUMNS)
            .bind(&name)
            .fetch_all(&mut *conn)
            .await
            .map_err(OrmError::execution(INDEX_COLUMNS))?;
        indexes.push((name, sql, columns.into_iter().flatten().collect()));
    }
    Ok(indexes)
}

/// Parses the `N` of a declared type such as `varchar(N)` or `decimal(N,M)`.
fn parse_size(data_type: &str) -> Option<u32> {
    let (_, rest) = data_type.split_once('(')?;
    let (inner, _) = rest.split_once(')')?;
    inner.split(',').next()?.trim().parse().ok()
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn driver_data_type(&self, column: &ColumnDef) -> Result<String> {
        let native = match column.kind {
            StorageKind::Bool => "numeric".to_string(),
            StorageKind::Int | StorageKind::Uint if column.auto_increment => {
                "integer PRIMARY KEY AUTOINCREMENT".to_string()
            }
            StorageKind::Int | StorageKind::Uint => "integer".to_string(),
            StorageKind::Float => "real".to_string(),
            StorageKind::String => match column.size {
                Some(n) => format!("varchar({n})"),
                None => "text".to_string(),
            },
            StorageKind::Time => "datetime".to_string(),
            StorageKind::Bytes => "blob".to_string(),
            StorageKind::Json => "text".to_string(),
        };
        Ok(native)
    }

    fn full_data_type(&self, column: &ColumnDef) -> Result<String> {
        let mut sql = self.driver_data_type(column)?;
        if column.is_not_null() || column.auto_increment {
            sql.push_str(" NOT NULL");
        }
        if column.unique && !column.auto_increment {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        Ok(sql)
    }

    async fn has_table(&self, table: &str) -> Result<bool> {
        let n = self
            .count(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[table],
            )
            .await?;
        Ok(n > 0)
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let n = self
            .count(
                "SELECT count(*) FROM pragma_table_info(?) WHERE name = ?",
                &[table, column],
            )
            .await?;
        Ok(n > 0)
    }

    async fn has_index(&self, table: &str, index: &str) -> Result<bool> {
        let n = self
            .count(
                "SELECT count(*) FROM sqlite_master \
                 WHERE type = 'index' AND tbl_name = ? AND name = ?",
                &[table, index],
            )
            .await?;
        Ok(n > 0)
    }

    async fn column_types(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        const SQL: &str =
            "SELECT name, type, \"notnull\" FROM pragma_table_info(?) ORDER BY cid";
        let rows: Vec<(String, String, i64)> = sqlx::query_as(SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(OrmError::execution(SQL))?;
        Ok(rows
            .into_iter()
            .map(|(name, data_type, not_null)| ColumnInfo {
                size: parse_size(&data_type),
                name,
                data_type,
                not_null: not_null != 0,
            })
            .collect())
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let mut clauses = schema
            .columns
            .iter()
            .map(|c| self.column_clause(c))
            .collect::<Result<Vec<_>>>()?;

        let keys: Vec<String> = schema.primary_keys().map(|c| quote_ident(&c.name)).collect();
        if !keys.is_empty() && !schema.columns.iter().any(|c| c.auto_increment) {
            clauses.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        let mut sql = format!(
            "CREATE TABLE {} ({})",
            quote_ident(&schema.name),
            clauses.join(", ")
        );
        if !schema.options.is_empty() {
            sql.push(' ');
            sql.push_str(&schema.options.join(", "));
        }
        self.execute(&sql).await?;

        for column in schema.columns.iter().filter(|c| c.index) {
            self.create_index(&schema.name, column).await?;
        }
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
            .await
    }

    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
        let clause = self.column_clause(column)?;
        let rebuild = (column.is_not_null() && column.default.is_none())
            || column.unique
            || column.primary_key;
        if !rebuild {
            return self
                .execute(&format!(
                    "ALTER TABLE {} ADD COLUMN {clause}",
                    quote_ident(table)
                ))
                .await;
        }

        let mut copy_exprs = HashMap::new();
        if column.is_not_null() && column.default.is_none() {
            copy_exprs.insert(
                column.name.to_lowercase(),
                zero_literal(column.kind).to_string(),
            );
        }
        self.recreate(
            table,
            move |doc| {
                doc.push_column(&clause);
                Ok(())
            },
            copy_exprs,
        )
        .await
    }

    async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        let name = column.to_string();
        let table_name = table.to_string();
        self.recreate(
            table,
            move |doc| {
                if doc.remove_column(&name) {
                    Ok(())
                } else {
                    Err(OrmError::Validation(format!(
                        "column `{name}` not found in `{table_name}`"
                    )))
                }
            },
            HashMap::new(),
        )
        .await
    }

    async fn alter_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
        let clause = self.column_clause(column)?;
        let mut copy_exprs = HashMap::new();
        if column.is_not_null() {
            let fallback = column
                .default
                .clone()
                .unwrap_or_else(|| zero_literal(column.kind).to_string());
            copy_exprs.insert(
                column.name.to_lowercase(),
                format!("COALESCE({}, {fallback})", quote_ident(&column.name)),
            );
        }
        let name = column.name.clone();
        let table_name = table.to_string();
        self.recreate(
            table,
            move |doc| {
                if doc.replace_column(&name, &clause) {
                    Ok(())
                } else {
                    Err(OrmError::Validation(format!(
                        "column `{name}` not found in `{table_name}`"
                    )))
                }
            },
            copy_exprs,
        )
        .await
    }

    async fn create_index(&self, table: &str, column: &ColumnDef) -> Result<()> {
        let class = column
            .index_class
            .as_deref()
            .map(|c| format!("{} ", c.trim().to_uppercase()))
            .unwrap_or_default();
        let sql = format!(
            "CREATE {class}INDEX {} ON {} ({})",
            quote_ident(&index_name(table, &column.name)),
            quote_ident(table),
            quote_ident(&column.name)
        );
        self.execute(&sql).await
    }

    async fn drop_index(&self, _table: &str, index: &str) -> Result<()> {
        self.execute(&format!("DROP INDEX IF EXISTS {}", quote_ident(index)))
            .await
    }

    async fn tables(&self) -> Result<Vec<String>> {
        const SQL: &str = "SELECT name FROM sqlite_master \
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";
        sqlx::query_scalar(SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(OrmError::execution(SQL))
    }

    async fn current_database(&self) -> Result<String> {
        const SQL: &str = "SELECT file FROM pragma_database_list WHERE name = 'main'";
        let file: Option<String> = sqlx::query_scalar(SQL)
            .fetch_optional(&self.pool)
            .await
            .map_err(OrmError::execution(SQL))?;
        Ok(file
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| "main".to_string()))
    }

    async fn raw_ddl(&self, table: &str) -> Result<String> {
        let mut conn = self.pool.acquire().await?;
        stored_ddl(&mut conn, table).await
    }
}
