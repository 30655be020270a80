//! Bulk SQL scripts.
//!
//! A script is line oriented: a statement starts on a line whose first word
//! is `SET`, `CREATE`, `INSERT` or `DROP` and runs until a line ending in
//! `;`. Blank lines, lines starting with `-- ` and lines outside a statement
//! are ignored.

use tracing::debug;

use crate::error::{OrmError, Result};

const STATEMENT_KEYWORDS: [&str; 4] = ["SET", "CREATE", "INSERT", "DROP"];

fn starts_statement(line: &str) -> bool {
    let word = line.split(' ').next().unwrap_or_default();
    STATEMENT_KEYWORDS
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

/// Splits a script into statements.
///
/// ```
/// let script = b"-- seed\nCREATE TABLE t (\n  id integer\n);\nINSERT INTO t VALUES (1);\n";
/// let statements = rowmap::split_script(script).unwrap();
/// assert_eq!(statements, vec!["CREATE TABLE t ( id integer );", "INSERT INTO t VALUES (1);"]);
/// ```
pub fn split_script(script: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(script)
        .map_err(|e| OrmError::Validation(format!("script is not valid UTF-8: {e}")))?;

    let mut statements = Vec::new();
    let mut current: Option<String> = None;
    for (number, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r').trim();
        if line.is_empty() || line.starts_with("-- ") {
            continue;
        }
        match current.as_mut() {
            Some(statement) => {
                statement.push(' ');
                statement.push_str(line);
            }
            None if starts_statement(line) => current = Some(line.to_string()),
            None => {
                debug!(line = number + 1, "skipping line outside a statement");
                continue;
            }
        }
        if current.as_deref().is_some_and(|s| s.ends_with(';')) {
            statements.extend(current.take());
        }
    }

    match current {
        Some(statement) => Err(OrmError::Validation(format!(
            "unterminated statement: {statement}"
        ))),
        None => Ok(statements),
    }
}
