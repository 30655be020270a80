//! INSERT statements.

use super::quote_ident;
use crate::value::SqlValue;

/// Builds an INSERT of the given column values.
///
/// With no columns the row is inserted with `DEFAULT VALUES`.
#[must_use]
pub fn insert_sql(table: &str, values: &[(&str, SqlValue)]) -> (String, Vec<SqlValue>) {
    if values.is_empty() {
        return (
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)),
            Vec::new(),
        );
    }
    let columns: Vec<String> = values.iter().map(|(c, _)| quote_ident(c)).collect();
    let placeholders = vec![SqlValue::placeholder(); values.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_ident(table),
        columns.join(", ")
    );
    (sql, values.iter().map(|(_, v)| v.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert() {
        let (sql, params) = insert_sql(
            "user",
            &[("name", SqlValue::Text("a".into())), ("age", SqlValue::Int(3))],
        );
        assert_eq!(sql, "INSERT INTO `user` (`name`, `age`) VALUES (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_insert_defaults() {
        let (sql, params) = insert_sql("log", &[]);
        assert_eq!(sql, "INSERT INTO `log` DEFAULT VALUES");
        assert!(params.is_empty());
    }
}
