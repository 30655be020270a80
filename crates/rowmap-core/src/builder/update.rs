//! UPDATE statements.

use super::quote_ident;
use crate::error::{Error, Result};
use crate::filter::Selector;
use crate::value::SqlValue;

/// Builds an UPDATE setting `set` on the rows matched by `selector`.
///
/// Fails when there is nothing to set or when the selector renders no clause,
/// so an UPDATE is never issued against the whole table by accident.
pub fn update_sql(
    table: &str,
    set: &[(&str, SqlValue)],
    selector: &Selector,
) -> Result<(String, Vec<SqlValue>)> {
    if set.is_empty() {
        return Err(Error::validation(format!("no columns to update in `{table}`")));
    }
    let mut params: Vec<SqlValue> = set.iter().map(|(_, v)| v.clone()).collect();
    let assignments: Vec<String> = set
        .iter()
        .map(|(c, _)| format!("{} = ?", quote_ident(c)))
        .collect();
    let clause = selector
        .to_sql(&mut params)
        .ok_or_else(|| Error::validation(format!("update of `{table}` requires a filter")))?;
    Ok((
        format!(
            "UPDATE {} SET {} WHERE {clause}",
            quote_ident(table),
            assignments.join(", ")
        ),
        params,
    ))
}
