//! SQL generation.
//!
//! Pure functions and small builders from table name, columns, selector,
//! ordering and pagination to SQL text plus positional arguments. Identifiers
//! are quoted with backticks; no ordering is ever added implicitly.

mod delete;
mod insert;
mod select;
mod update;

pub use delete::{Delete, Filtered, Unfiltered, Unscoped};
pub use insert::insert_sql;
pub use select::{ListSql, Select};
pub use update::update_sql;

use std::fmt;

use crate::error::{Error, Result};

/// Quotes an identifier with backticks, doubling embedded backticks.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Order direction for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order (ASC)
    Asc,
    /// Descending order (DESC)
    Desc,
}

/// An ordering specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to order by
    pub column: String,
    /// Order direction
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Ascending order on `column`.
    #[must_use]
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Asc,
        }
    }

    /// Descending order on `column`.
    #[must_use]
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Desc,
        }
    }

    /// Parses `"-created_at"`, `"name"`, `"name desc"` or `"name ASC"`.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if let Some(column) = spec.strip_prefix('-') {
            return Self::desc(column.trim());
        }
        let mut words = spec.split_whitespace();
        let column = words.next().unwrap_or_default();
        match words.next() {
            Some(dir) if dir.eq_ignore_ascii_case("desc") => Self::desc(column),
            _ => Self::asc(column),
        }
    }

    /// Returns the SQL representation.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self.direction {
            OrderDirection::Asc => format!("{} ASC", quote_ident(&self.column)),
            OrderDirection::Desc => format!("{} DESC", quote_ident(&self.column)),
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Fails when any referenced column is not among `known` (case-insensitive).
pub fn validate_columns<'a>(
    table: &str,
    known: &[&str],
    referenced: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    for column in referenced {
        if !known.iter().any(|k| k.eq_ignore_ascii_case(column)) {
            return Err(Error::validation(format!(
                "unknown column `{column}` for table `{table}`"
            )));
        }
    }
    Ok(())
}
