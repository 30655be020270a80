//! Record descriptions and their resolved column bindings.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::{bindings, default_table_name, ColumnDef, FieldValue, StorageKind, TableSchema};
use crate::error::{Error, Result, ValueError};
use crate::value::SqlValue;

/// A type that maps to one table.
///
/// Usually implemented with `#[derive(Record)]`.
///
/// ```
/// use rowmap_core::{Record, SchemaBuilder};
///
/// #[derive(Default)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// impl Record for Tag {
///     fn describe(s: &mut SchemaBuilder<Self>) {
///         s.field("id", |t| &t.id, |t| &mut t.id).primary_key().auto_increment();
///         s.field("label", |t| &t.label, |t| &mut t.label).size(32).not_null();
///     }
/// }
///
/// assert_eq!(Tag::table_name(), "tag");
/// ```
pub trait Record: Default + Send + Sync + 'static {
    /// Table name; defaults to the snake-cased type name.
    fn table_name() -> String {
        default_table_name::<Self>()
    }

    /// Declares the columns of the record.
    fn describe(schema: &mut SchemaBuilder<Self>);
}

type FieldResult<V> = std::result::Result<V, ValueError>;
type Getter<T> = Arc<dyn Fn(&T) -> FieldResult<SqlValue> + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, SqlValue) -> FieldResult<()> + Send + Sync>;

/// One column of a record: its definition plus accessors into the record.
pub struct ColumnBinding<T> {
    def: ColumnDef,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T> Clone for ColumnBinding<T> {
    fn clone(&self) -> Self {
        Self {
            def: self.def.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<T> fmt::Debug for ColumnBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnBinding").field("def", &self.def).finish_non_exhaustive()
    }
}

impl<T> ColumnBinding<T> {
    /// Column definition.
    #[must_use]
    pub const fn def(&self) -> &ColumnDef {
        &self.def
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Reads the column value out of a record.
    pub fn value(&self, record: &T) -> Result<SqlValue> {
        (self.get)(record).map_err(|source| Error::Encode {
            column: self.def.name.clone(),
            source,
        })
    }

    /// Stores a decoded cell into a record.
    pub fn assign(&self, record: &mut T, value: SqlValue) -> Result<()> {
        (self.set)(record, value).map_err(|source| Error::Decode {
            column: self.def.name.clone(),
            source,
        })
    }
}

/// Collects the columns of a record while [`Record::describe`] runs.
pub struct SchemaBuilder<T> {
    table: TableSchema,
    bindings: Vec<ColumnBinding<T>>,
}

impl<T: Record> SchemaBuilder<T> {
    fn new(table: String) -> Self {
        Self {
            table: TableSchema::new(table),
            bindings: Vec::new(),
        }
    }

    /// Binds a field whose storage kind follows from its Rust type.
    pub fn field<V: FieldValue>(
        &mut self,
        name: &str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> FieldOptions<'_, T> {
        let Some(kind) = V::KIND else {
            warn!(
                table = %self.table.name,
                field = name,
                "cannot determine storage kind, field skipped"
            );
            return FieldOptions::skipped(self);
        };
        self.scalar(name, kind, get, get_mut)
    }

    /// Binds a field with an explicit kind tag such as `"int"` or `"json"`.
    pub fn field_as<V: FieldValue>(
        &mut self,
        name: &str,
        kind: &str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> FieldOptions<'_, T> {
        let Some(kind) = StorageKind::parse(kind) else {
            warn!(
                table = %self.table.name,
                field = name,
                kind,
                "unknown storage kind, field skipped"
            );
            return FieldOptions::skipped(self);
        };
        self.scalar(name, kind, get, get_mut)
    }

    /// Binds a nested value stored as one JSON column.
    ///
    /// The destination is only replaced when the stored JSON decodes, so an
    /// `Option<S>` field stays `None` until a value is read successfully.
    pub fn json<V>(
        &mut self,
        name: &str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> FieldOptions<'_, T>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let mut def = ColumnDef::new(name, StorageKind::Json);
        def.not_null = Some(false);
        let getter: Getter<T> = Arc::new(move |r: &T| -> FieldResult<SqlValue> {
            let encoded = serde_json::to_value(get(r))?;
            if encoded.is_null() {
                Ok(SqlValue::Null)
            } else {
                Ok(SqlValue::Text(encoded.to_string()))
            }
        });
        let setter: Setter<T> = Arc::new(move |r: &mut T, value: SqlValue| -> FieldResult<()> {
            let decoded: V = match value {
                SqlValue::Null => return Ok(()),
                SqlValue::Text(s) => serde_json::from_str(&s)?,
                SqlValue::Blob(b) => serde_json::from_slice(&b)?,
                other => {
                    return Err(ValueError::Mismatch {
                        expected: "json",
                        found: other.type_name(),
                    })
                }
            };
            *get_mut(r) = decoded;
            Ok(())
        });
        self.push(def, getter, setter)
    }

    /// Flattens the columns of another record into this one.
    pub fn embed<S: Record>(
        &mut self,
        get: fn(&T) -> &S,
        get_mut: fn(&mut T) -> &mut S,
    ) -> &mut Self {
        let inner = bindings::<S>();
        for binding in inner.bindings() {
            let inner_get = Arc::clone(&binding.get);
            let inner_set = Arc::clone(&binding.set);
            let getter: Getter<T> = Arc::new(move |r: &T| inner_get(get(r)));
            let setter: Setter<T> =
                Arc::new(move |r: &mut T, v: SqlValue| inner_set(get_mut(r), v));
            self.push(binding.def.clone(), getter, setter);
        }
        self
    }

    /// Appends a table option such as `WITHOUT ROWID`.
    pub fn table_option(&mut self, option: impl Into<String>) -> &mut Self {
        self.table.options.push(option.into());
        self
    }

    /// Sets the table comment.
    pub fn comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.table.comment = Some(comment.into());
        self
    }

    fn scalar<V: FieldValue>(
        &mut self,
        name: &str,
        kind: StorageKind,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> FieldOptions<'_, T> {
        let mut def = ColumnDef::new(name, kind);
        if V::NULLABLE {
            def.not_null = Some(false);
        }
        let getter: Getter<T> = Arc::new(move |r: &T| -> FieldResult<SqlValue> {
            Ok(get(r).to_value())
        });
        let setter: Setter<T> = Arc::new(move |r: &mut T, value: SqlValue| -> FieldResult<()> {
            *get_mut(r) = V::from_value(value)?;
            Ok(())
        });
        self.push(def, getter, setter)
    }

    fn push(&mut self, def: ColumnDef, get: Getter<T>, set: Setter<T>) -> FieldOptions<'_, T> {
        if self.bindings.iter().any(|b| b.def.name == def.name) {
            warn!(
                table = %self.table.name,
                column = %def.name,
                "duplicate column name, field skipped"
            );
            return FieldOptions::skipped(self);
        }
        self.bindings.push(ColumnBinding { def, get, set });
        let index = self.bindings.len() - 1;
        FieldOptions {
            builder: self,
            index: Some(index),
        }
    }

    fn finish(mut self) -> RecordSchema<T> {
        self.table.columns = self.bindings.iter().map(|b| b.def.clone()).collect();
        RecordSchema {
            table: self.table,
            bindings: self.bindings,
        }
    }
}

/// Chainable column options returned by the [`SchemaBuilder`] field methods.
///
/// Options on a skipped field are ignored.
pub struct FieldOptions<'a, T> {
    builder: &'a mut SchemaBuilder<T>,
    index: Option<usize>,
}

impl<'a, T> FieldOptions<'a, T> {
    fn skipped(builder: &'a mut SchemaBuilder<T>) -> Self {
        Self {
            builder,
            index: None,
        }
    }

    fn update(mut self, f: impl FnOnce(&mut ColumnDef)) -> Self {
        if let Some(i) = self.index {
            let def = &mut self.builder.bindings[i].def;
            f(def);
        }
        self
    }

    /// Declared size, e.g. `varchar(N)`.
    pub fn size(self, size: u32) -> Self {
        self.update(|d| d.size = Some(size))
    }

    /// Adds a UNIQUE constraint.
    pub fn unique(self) -> Self {
        self.update(|d| d.unique = true)
    }

    /// Raw SQL default expression.
    pub fn default(self, expr: impl Into<String>) -> Self {
        let expr = expr.into();
        self.update(|d| d.default = Some(expr))
    }

    /// Marks the column as part of the primary key.
    pub fn primary_key(self) -> Self {
        self.update(|d| {
            d.primary_key = true;
            d.not_null = Some(true);
        })
    }

    /// Marks the column as an auto-increment key.
    ///
    /// The database always fills the key, so the column is NOT NULL even for
    /// an `Option` field.
    pub fn auto_increment(self) -> Self {
        self.update(|d| {
            d.auto_increment = true;
            d.not_null = Some(true);
        })
    }

    /// Requests an index on the column.
    pub fn index(self) -> Self {
        self.update(|d| d.index = true)
    }

    /// Requests an index of the given class, e.g. `UNIQUE`.
    pub fn index_class(self, class: impl Into<String>) -> Self {
        let class = class.into();
        self.update(|d| {
            d.index = true;
            d.index_class = Some(class);
        })
    }

    /// Declares the column NOT NULL.
    pub fn not_null(self) -> Self {
        self.update(|d| d.not_null = Some(true))
    }

    /// Declares the column nullable.
    pub fn nullable(self) -> Self {
        self.update(|d| d.not_null = Some(false))
    }
}

/// The resolved, immutable binding table of a record type.
pub struct RecordSchema<T> {
    table: TableSchema,
    bindings: Vec<ColumnBinding<T>>,
}

impl<T> fmt::Debug for RecordSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema").field("table", &self.table).finish_non_exhaustive()
    }
}

impl<T: Record> RecordSchema<T> {
    /// Runs [`Record::describe`] and resolves the bindings, bypassing the cache.
    #[must_use]
    pub fn derive() -> Self {
        let mut builder = SchemaBuilder::new(T::table_name());
        T::describe(&mut builder);
        builder.finish()
    }
}

impl<T> RecordSchema<T> {
    /// Desired table schema.
    #[must_use]
    pub const fn table(&self) -> &TableSchema {
        &self.table
    }

    /// Table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table.name
    }

    /// Ordered bindings.
    #[must_use]
    pub fn bindings(&self) -> &[ColumnBinding<T>] {
        &self.bindings
    }

    /// Ordered column names.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.bindings.iter().map(ColumnBinding::name).collect()
    }

    /// Finds a binding by name, ignoring case.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&ColumnBinding<T>> {
        self.bindings
            .iter()
            .find(|b| b.def.name.eq_ignore_ascii_case(name))
    }

    /// Bindings of the primary key columns.
    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnBinding<T>> {
        self.bindings.iter().filter(|b| b.def.primary_key)
    }

    /// Reads every column of a record, in binding order.
    pub fn values<'s>(&'s self, record: &T) -> Result<Vec<(&'s ColumnDef, SqlValue)>> {
        self.bindings
            .iter()
            .map(|b| Ok((&b.def, b.value(record)?)))
            .collect()
    }
}
