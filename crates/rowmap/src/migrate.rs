//! Automigrate: reconcile a live table with the schema a record describes.
//!
//! The plan is recomputed on every call and never stored. Columns missing
//! from the table are added, columns whose size or nullability differ are
//! altered, and missing indexes are created. Columns the record no longer
//! describes are left alone.

use rowmap_core::{index_name, ColumnDef, TableSchema};
use tracing::{debug, info};

use crate::dialect::{ColumnInfo, Driver};
use crate::error::Result;

/// One DDL operation issued by [`automigrate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStep {
    /// The table did not exist and was created with its indexes.
    CreateTable {
        /// Table name.
        table: String,
    },
    /// A missing column was added.
    AddColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A column's size or nullability was changed.
    AlterColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A missing index was created.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },
}

/// Whether an existing column must be altered to match `desired`.
///
/// Size is compared only when the live column declares one; nullability only
/// when the record states one.
#[must_use]
pub fn needs_alter(desired: &ColumnDef, actual: &ColumnInfo) -> bool {
    let size_differs = actual.size.is_some() && actual.size != desired.size;
    let null_differs = desired
        .not_null
        .is_some_and(|not_null| not_null != actual.not_null);
    size_differs || null_differs
}

/// Brings `schema.name` in line with `schema` and returns the steps taken.
///
/// Stops at the first failing step; whatever ran before it stays applied,
/// and running again picks up from there.
pub async fn automigrate(driver: &dyn Driver, schema: &TableSchema) -> Result<Vec<MigrationStep>> {
    let table = schema.name.as_str();
    let mut steps = Vec::new();

    if !driver.has_table(table).await? {
        driver.create_table(schema).await?;
        info!(table, "created table");
        steps.push(MigrationStep::CreateTable {
            table: table.to_string(),
        });
        return Ok(steps);
    }

    let actual = driver.column_types(table).await?;
    for desired in &schema.columns {
        match actual.iter().find(|a| a.name == desired.name) {
            None => {
                driver.add_column(table, desired).await?;
                info!(table, column = %desired.name, "added column");
                steps.push(MigrationStep::AddColumn {
                    table: table.to_string(),
                    column: desired.name.clone(),
                });
            }
            Some(existing) if needs_alter(desired, existing) => {
                driver.alter_column(table, desired).await?;
                info!(
                    table,
                    column = %desired.name,
                    from = %existing.data_type,
                    "altered column"
                );
                steps.push(MigrationStep::AlterColumn {
                    table: table.to_string(),
                    column: desired.name.clone(),
                });
            }
            Some(_) => debug!(table, column = %desired.name, "column up to date"),
        }
    }

    for column in schema.columns.iter().filter(|c| c.index) {
        let index = index_name(table, &column.name);
        if driver.has_index(table, &index).await? {
            continue;
        }
        driver.create_index(table, column).await?;
        info!(table, index = %index, "created index");
        steps.push(MigrationStep::CreateIndex {
            table: table.to_string(),
            index,
        });
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_core::StorageKind;

    fn actual(size: Option<u32>, not_null: bool) -> ColumnInfo {
        ColumnInfo {
            name: "code".to_string(),
            data_type: "varchar(5)".to_string(),
            size,
            not_null,
        }
    }

    #[test]
    fn test_needs_alter() {
        let mut desired = ColumnDef::new("code", StorageKind::String);
        desired.size = Some(5);
        assert!(!needs_alter(&desired, &actual(Some(5), false)));
        assert!(!needs_alter(&desired, &actual(Some(5), true)));

        desired.not_null = Some(true);
        assert!(needs_alter(&desired, &actual(Some(5), false)));

        desired.not_null = None;
        desired.size = Some(10);
        assert!(needs_alter(&desired, &actual(Some(5), false)));
        assert!(!needs_alter(&desired, &actual(None, false)));
    }
}
