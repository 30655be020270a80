//! Rewriting of existing `CREATE TABLE` statements.
//!
//! Dialects without native `ALTER COLUMN` / `DROP COLUMN` rebuild the table
//! from its stored DDL. [`DdlDocument`] splits that DDL into a head, opaque
//! field/constraint clauses and a trailing options part, lets the caller edit
//! the clauses, and renders it back. It tracks quotes and brackets only and
//! never interprets column types.
//!
//! ```
//! use rowmap_core::DdlDocument;
//!
//! let mut ddl = DdlDocument::parse(
//!     "CREATE TABLE \"t\" (`a` INT, `b` TEXT DEFAULT 'x,y', CONSTRAINT \"pk\" PRIMARY KEY(`a`))",
//! )
//! .unwrap();
//! assert_eq!(ddl.fields().len(), 3);
//! assert_eq!(ddl.columns(), vec!["a", "b"]);
//!
//! ddl.rename_table("t__temp");
//! ddl.remove_column("b");
//! assert_eq!(
//!     ddl.compile(),
//!     "CREATE TABLE `t__temp` (`a` INT, CONSTRAINT \"pk\" PRIMARY KEY(`a`))"
//! );
//! ```

mod scanner;

pub use scanner::{leading_identifier, Scanner, Sections, Span};

use regex::Regex;

use crate::builder::quote_ident;
use crate::error::{Error, Result};

/// Leading keywords of table-level clauses that do not define a column.
const TABLE_CONSTRAINTS: [&str; 5] = ["PRIMARY", "CHECK", "CONSTRAINT", "UNIQUE", "FOREIGN"];

/// A parsed `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlDocument {
    head: String,
    fields: Vec<String>,
    tail: String,
}

impl DdlDocument {
    /// Parses raw DDL text.
    pub fn parse(sql: &str) -> Result<Self> {
        let sections = Scanner::new(sql).sections()?;
        let head = sql[sections.head.start..sections.head.end].trim().to_string();
        if !head.to_ascii_uppercase().starts_with("CREATE TABLE") {
            return Err(Error::DdlParse {
                offset: 0,
                message: "not a CREATE TABLE statement".to_string(),
            });
        }
        let fields = sections
            .clauses
            .iter()
            .map(|s| sql[s.start..s.end].trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        Ok(Self {
            head,
            fields,
            tail: sql[sections.tail.start..sections.tail.end].trim().to_string(),
        })
    }

    /// The `CREATE TABLE <name>` prefix.
    #[must_use]
    pub fn head(&self) -> &str {
        &self.head
    }

    /// Field and constraint clauses in order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Table options after the column list, e.g. `WITHOUT ROWID`.
    #[must_use]
    pub fn tail(&self) -> &str {
        &self.tail
    }

    /// Renders the statement back to text.
    #[must_use]
    pub fn compile(&self) -> String {
        let mut sql = if self.fields.is_empty() {
            self.head.clone()
        } else {
            format!("{} ({})", self.head, self.fields.join(", "))
        };
        if !self.tail.is_empty() {
            sql.push(' ');
            sql.push_str(&self.tail);
        }
        sql
    }

    /// Matches clauses of the form `CONSTRAINT <name> ...`.
    fn constraint_matcher(name: &str) -> impl Fn(&str) -> bool {
        let pattern = format!(r#"(?i)^CONSTRAINT\s+["`\[]?{}["`\]\s]"#, regex::escape(name));
        let re = Regex::new(&pattern).ok();
        move |field: &str| re.as_ref().is_some_and(|re| re.is_match(field))
    }

    /// Replaces the named constraint clause, or appends it when absent.
    pub fn add_constraint(&mut self, name: &str, clause: &str) {
        let matches = Self::constraint_matcher(name);
        match self.fields.iter_mut().find(|f| matches(f.as_str())) {
            Some(field) => *field = clause.to_string(),
            None => self.fields.push(clause.to_string()),
        }
    }

    /// Removes the named constraint clause; returns whether one was removed.
    pub fn remove_constraint(&mut self, name: &str) -> bool {
        let matches = Self::constraint_matcher(name);
        let before = self.fields.len();
        self.fields.retain(|f| !matches(f.as_str()));
        self.fields.len() != before
    }

    /// Whether a constraint clause with this name exists.
    #[must_use]
    pub fn has_constraint(&self, name: &str) -> bool {
        let matches = Self::constraint_matcher(name);
        self.fields.iter().any(|f| matches(f.as_str()))
    }

    fn column_of(field: &str) -> Option<String> {
        let (name, quoted) = leading_identifier(field)?;
        if !quoted
            && TABLE_CONSTRAINTS
                .iter()
                .any(|k| name.eq_ignore_ascii_case(k))
        {
            return None;
        }
        Some(name)
    }

    /// Bare names of the columns the statement defines, in order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().filter_map(|f| Self::column_of(f)).collect()
    }

    fn position_of(&self, column: &str) -> Option<usize> {
        self.fields.iter().position(|f| {
            Self::column_of(f).is_some_and(|name| name.eq_ignore_ascii_case(column))
        })
    }

    /// Replaces the definition of `column`; returns whether it existed.
    pub fn replace_column(&mut self, column: &str, clause: &str) -> bool {
        match self.position_of(column) {
            Some(i) => {
                self.fields[i] = clause.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes the definition of `column`; returns whether it existed.
    pub fn remove_column(&mut self, column: &str) -> bool {
        match self.position_of(column) {
            Some(i) => {
                self.fields.remove(i);
                true
            }
            None => false,
        }
    }

    /// Adds a column definition after the existing column definitions.
    pub fn push_column(&mut self, clause: &str) {
        let at = self
            .fields
            .iter()
            .rposition(|f| Self::column_of(f).is_some())
            .map_or(0, |i| i + 1);
        self.fields.insert(at, clause.to_string());
    }

    /// Name of the table in the head, unquoted.
    #[must_use]
    pub fn table_name(&self) -> Option<String> {
        let (start, _) = self.name_token()?;
        let token = &self.head[start..];
        let token = token.rsplit_once('.').map_or(token, |(_, name)| name);
        leading_identifier(token).map(|(name, _)| name)
    }

    /// Byte range of the (possibly quoted, possibly schema-qualified) table
    /// name token at the end of the head.
    fn name_token(&self) -> Option<(usize, usize)> {
        let head = self.head.as_str();
        let end = head.len();
        let last = head.chars().last()?;
        let opening = match last {
            '"' | '`' | '\'' => Some(last),
            ']' => Some('['),
            _ => None,
        };
        let start = match opening {
            Some(open) => {
                let inner = &head[..end - last.len_utf8()];
                let mut start = inner.rfind(open)?;
                // Extend over a schema prefix such as `main.`.
                if let Some(prefix) = head[..start].strip_suffix('.') {
                    start = prefix
                        .rfind(char::is_whitespace)
                        .map_or(0, |i| i + 1);
                }
                start
            }
            None => head.rfind(char::is_whitespace).map_or(0, |i| i + 1),
        };
        (start > 0).then_some((start, end))
    }

    /// Rewrites the table name token in the head to `name`, quoted with
    /// backticks. Returns false when the head has no name token.
    pub fn rename_table(&mut self, name: &str) -> bool {
        match self.name_token() {
            Some((start, end)) => {
                self.head.replace_range(start..end, &quote_ident(name));
                true
            }
            None => false,
        }
    }
}
