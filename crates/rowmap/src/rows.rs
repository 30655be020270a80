//! Binding of result rows into records and scalars.
//!
//! A row is bound in two passes. The first pass decodes every cell of the
//! row by its runtime storage class. The second pass hands the cells to the
//! record's column bindings, after turning JSON cells into raw bytes and
//! integer cells of time columns into timestamps.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::TryStreamExt;
use rowmap_core::schema::{bindings, FieldValue, Record, RecordSchema, StorageKind};
use rowmap_core::value::time_from_epoch;
use rowmap_core::SqlValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::error::{OrmError, Result};

/// A pending result set.
///
/// Every consuming method releases the underlying cursor when it returns,
/// on success and on error alike.
pub struct Rows<'q> {
    stream: BoxStream<'q, std::result::Result<SqliteRow, sqlx::Error>>,
    sql: String,
    max_rows: usize,
    ignore_not_found: bool,
}

impl<'q> Rows<'q> {
    pub(crate) fn new(
        stream: BoxStream<'q, std::result::Result<SqliteRow, sqlx::Error>>,
        sql: &str,
        max_rows: usize,
        ignore_not_found: bool,
    ) -> Self {
        Self {
            stream,
            sql: sql.to_string(),
            max_rows,
            ignore_not_found,
        }
    }

    /// Overrides the not-found behavior of [`Rows::row`] and friends.
    #[must_use]
    pub const fn ignore_not_found(mut self, ignore: bool) -> Self {
        self.ignore_not_found = ignore;
        self
    }

    /// Overrides the cap applied by [`Rows::rows`] and [`Rows::scalars`].
    #[must_use]
    pub const fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    async fn next_row(&mut self) -> Result<Option<SqliteRow>> {
        self.stream
            .try_next()
            .await
            .map_err(OrmError::execution(&self.sql))
    }

    async fn first_row(&mut self) -> Result<Option<SqliteRow>> {
        match self.next_row().await? {
            Some(row) => Ok(Some(row)),
            None if self.ignore_not_found => Ok(None),
            None => Err(OrmError::NotFound),
        }
    }

    /// Binds the first row into `dest`.
    ///
    /// An empty result is [`OrmError::NotFound`] unless not-found is ignored,
    /// in which case `dest` is left untouched.
    pub async fn row<T: Record>(mut self, dest: &mut T) -> Result<()> {
        if let Some(row) = self.first_row().await? {
            bind_record(&bindings::<T>(), &row, dest)?;
        }
        Ok(())
    }

    /// Decodes the first column of the first row into `dest`.
    pub async fn scalar<V: FieldValue>(mut self, dest: &mut V) -> Result<()> {
        if let Some(row) = self.first_row().await? {
            *dest = decode_scalar(&row)?;
        }
        Ok(())
    }

    /// Returns every cell of the first row.
    ///
    /// Empty when there is no row and not-found is ignored.
    pub async fn values(mut self) -> Result<Vec<SqlValue>> {
        let Some(row) = self.first_row().await? else {
            return Ok(Vec::new());
        };
        row.columns()
            .iter()
            .map(|c| decode_cell(&row, c.ordinal(), c.name()))
            .collect()
    }

    /// Appends one record per row to `dest`, stopping at the row cap.
    pub async fn rows<T: Record>(mut self, dest: &mut Vec<T>) -> Result<()> {
        let schema = bindings::<T>();
        let mut fetched = 0;
        while fetched < self.max_rows {
            let Some(row) = self.next_row().await? else {
                return Ok(());
            };
            let mut record = T::default();
            bind_record(&schema, &row, &mut record)?;
            dest.push(record);
            fetched += 1;
        }
        debug!(sql = %self.sql, max_rows = self.max_rows, "row cap reached");
        Ok(())
    }

    /// Appends the first column of each row to `dest`, stopping at the row cap.
    pub async fn scalars<V: FieldValue>(mut self, dest: &mut Vec<V>) -> Result<()> {
        let mut fetched = 0;
        while fetched < self.max_rows {
            let Some(row) = self.next_row().await? else {
                return Ok(());
            };
            dest.push(decode_scalar(&row)?);
            fetched += 1;
        }
        debug!(sql = %self.sql, max_rows = self.max_rows, "row cap reached");
        Ok(())
    }

    /// Turns the result set into an incremental iterator over records.
    #[must_use]
    pub fn iter<T: Record>(self) -> RowIter<'q, T> {
        RowIter {
            rows: self,
            schema: bindings::<T>(),
            _record: PhantomData,
        }
    }
}

/// Incremental record iterator over a result set.
///
/// Holds the cursor until it is exhausted, closed or dropped.
pub struct RowIter<'q, T> {
    rows: Rows<'q>,
    schema: Arc<RecordSchema<T>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> RowIter<'_, T> {
    /// Binds the next row into `dest`; returns false once the rows run out.
    pub async fn next(&mut self, dest: &mut T) -> Result<bool> {
        match self.rows.next_row().await? {
            Some(row) => {
                bind_record(&self.schema, &row, dest)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Releases the cursor.
    pub fn close(self) {}
}

enum Transfer {
    Assign(SqlValue),
    Json(Vec<u8>),
    Epoch(i64),
}

fn bind_record<T>(schema: &RecordSchema<T>, row: &SqliteRow, dest: &mut T) -> Result<()> {
    let positions: HashMap<String, usize> = row
        .columns()
        .iter()
        .map(|c| (c.name().to_lowercase(), c.ordinal()))
        .collect();

    let mut pending = Vec::with_capacity(schema.bindings().len());
    for binding in schema.bindings() {
        let Some(&index) = positions.get(binding.name()) else {
            continue;
        };
        let cell = decode_cell(row, index, binding.name())?;
        let transfer = match (binding.def().kind, cell) {
            (StorageKind::Json, SqlValue::Null) => continue,
            (StorageKind::Json, SqlValue::Text(s)) => Transfer::Json(s.into_bytes()),
            (StorageKind::Json, SqlValue::Blob(b)) => Transfer::Json(b),
            (StorageKind::Time, SqlValue::Int(secs)) => Transfer::Epoch(secs),
            (_, cell) => Transfer::Assign(cell),
        };
        pending.push((binding, transfer));
    }

    for (binding, transfer) in pending {
        let value = match transfer {
            Transfer::Assign(value) => value,
            Transfer::Json(raw) => SqlValue::Blob(raw),
            Transfer::Epoch(secs) => {
                SqlValue::Time(time_from_epoch(secs).map_err(|e| OrmError::Decode {
                    column: binding.name().to_string(),
                    message: e.to_string(),
                })?)
            }
        };
        binding.assign(dest, value)?;
    }
    Ok(())
}

fn decode_scalar<V: FieldValue>(row: &SqliteRow) -> Result<V> {
    let Some(column) = row.columns().first() else {
        return Err(OrmError::Validation("result has no columns".to_string()));
    };
    let cell = decode_cell(row, 0, column.name())?;
    V::from_value(cell).map_err(|e| OrmError::Decode {
        column: column.name().to_string(),
        message: e.to_string(),
    })
}

/// Decodes one cell by the storage class of the stored value.
fn decode_cell(row: &SqliteRow, index: usize, column: &str) -> Result<SqlValue> {
    let decode_err = |e: sqlx::Error| OrmError::Decode {
        column: column.to_string(),
        message: e.to_string(),
    };
    let raw = row.try_get_raw(index).map_err(decode_err)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => {
            SqlValue::Int(row.try_get_unchecked::<i64, _>(index).map_err(decode_err)?)
        }
        "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index).map_err(decode_err)?),
        "BLOB" => {
            SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index).map_err(decode_err)?)
        }
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index).map_err(decode_err)?),
    };
    Ok(value)
}
