//! DELETE statements using the typestate pattern.
//!
//! A filtered delete and a whole-table delete are different states, so an
//! unfiltered DELETE can only be produced by asking for it with
//! [`Delete::all`].

use std::marker::PhantomData;

use super::quote_ident;
use crate::error::{Error, Result};
use crate::filter::Selector;
use crate::value::SqlValue;

// Typestate markers

/// Marker: no scope chosen yet.
pub struct Unscoped;
/// Marker: restricted by a selector.
pub struct Filtered;
/// Marker: explicitly deletes every row.
pub struct Unfiltered;

/// DELETE builder.
pub struct Delete<State> {
    table: String,
    selector: Option<Selector>,
    _state: PhantomData<State>,
}

impl Delete<Unscoped> {
    /// Deletes from `table`.
    #[must_use]
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            selector: None,
            _state: PhantomData,
        }
    }

    /// Restricts the delete to rows matching `selector`.
    ///
    /// `None` is accepted here and rejected by [`Delete::build`].
    #[must_use]
    pub fn filter(self, selector: Option<Selector>) -> Delete<Filtered> {
        Delete {
            table: self.table,
            selector,
            _state: PhantomData,
        }
    }

    /// Deletes every row.
    #[must_use]
    pub fn all(self) -> Delete<Unfiltered> {
        Delete {
            table: self.table,
            selector: None,
            _state: PhantomData,
        }
    }
}

impl Delete<Filtered> {
    /// Builds the statement; fails when the selector is missing or renders
    /// no clause.
    pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
        let mut params = Vec::new();
        let clause = self
            .selector
            .as_ref()
            .and_then(|s| s.to_sql(&mut params))
            .ok_or_else(|| {
                Error::validation(format!(
                    "delete from `{}` requires a non-empty filter",
                    self.table
                ))
            })?;
        Ok((
            format!("DELETE FROM {} WHERE {clause}", quote_ident(&self.table)),
            params,
        ))
    }
}

impl Delete<Unfiltered> {
    /// Builds the unfiltered statement.
    #[must_use]
    pub fn build(&self) -> String {
        format!("DELETE FROM {}", quote_ident(&self.table))
    }
}
