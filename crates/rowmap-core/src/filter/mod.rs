//! Filter selectors.
//!
//! A [`Selector`] is a WHERE-clause predicate kept as a tree until the SQL
//! generator renders it:
//!
//! ```
//! use rowmap_core::Selector;
//!
//! let filter = Selector::eq("status", "active")
//!     .and(Selector::gt("age", 18).or(Selector::eq("verified", true)));
//!
//! let mut params = Vec::new();
//! let sql = filter.to_sql(&mut params).unwrap();
//! assert_eq!(sql, "(`status` = ?) AND ((`age` > ?) OR (`verified` = ?))");
//! assert_eq!(params.len(), 3);
//! ```

mod parse;

use std::fmt;

use crate::builder::quote_ident;
use crate::value::{SqlValue, ToSqlValue};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        })
    }
}

/// A filter expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `column op value`
    Comparison {
        /// Column name.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Literal operand.
        value: SqlValue,
    },
    /// `column IS NULL`
    IsNull(String),
    /// `column IS NOT NULL`
    IsNotNull(String),
    /// `column IN (...)`
    In {
        /// Column name.
        column: String,
        /// Candidate values.
        values: Vec<SqlValue>,
    },
    /// `column NOT IN (...)`
    NotIn {
        /// Column name.
        column: String,
        /// Excluded values.
        values: Vec<SqlValue>,
    },
    /// `column LIKE pattern`
    Like {
        /// Column name.
        column: String,
        /// LIKE pattern.
        pattern: String,
    },
    /// Conjunction; empty means no constraint.
    And(Vec<Selector>),
    /// Disjunction; empty means no constraint.
    Or(Vec<Selector>),
    /// Negation.
    Not(Box<Selector>),
}

impl Selector {
    fn compare<V: ToSqlValue>(column: &str, op: CompareOp, value: V) -> Self {
        Self::Comparison {
            column: column.to_string(),
            op,
            value: value.to_sql_value(),
        }
    }

    /// `column = value`
    pub fn eq<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// `column != value`
    pub fn ne<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    /// `column > value`
    pub fn gt<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    /// `column >= value`
    pub fn gte<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::compare(column, CompareOp::Gte, value)
    }

    /// `column < value`
    pub fn lt<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    /// `column <= value`
    pub fn lte<V: ToSqlValue>(column: &str, value: V) -> Self {
        Self::compare(column, CompareOp::Lte, value)
    }

    /// `column IS NULL`
    #[must_use]
    pub fn is_null(column: &str) -> Self {
        Self::IsNull(column.to_string())
    }

    /// `column IS NOT NULL`
    #[must_use]
    pub fn is_not_null(column: &str) -> Self {
        Self::IsNotNull(column.to_string())
    }

    /// `column IN (values)`
    pub fn in_list<V: ToSqlValue>(column: &str, values: Vec<V>) -> Self {
        Self::In {
            column: column.to_string(),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
        }
    }

    /// `column NOT IN (values)`
    pub fn not_in<V: ToSqlValue>(column: &str, values: Vec<V>) -> Self {
        Self::NotIn {
            column: column.to_string(),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
        }
    }

    /// `column LIKE pattern`
    #[must_use]
    pub fn like(column: &str, pattern: &str) -> Self {
        Self::Like {
            column: column.to_string(),
            pattern: pattern.to_string(),
        }
    }

    /// Combines with AND, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut items) => {
                items.push(other);
                Self::And(items)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Combines with OR, flattening nested disjunctions.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut items) => {
                items.push(other);
                Self::Or(items)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Negates the expression.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Renders the predicate, appending its arguments to `params`.
    ///
    /// Returns `None` when the tree produces no clause at all, e.g. an empty
    /// conjunction.
    pub fn to_sql(&self, params: &mut Vec<SqlValue>) -> Option<String> {
        match self {
            Self::Comparison { column, op, value } => {
                params.push(value.clone());
                Some(format!("{} {op} ?", quote_ident(column)))
            }
            Self::IsNull(column) => Some(format!("{} IS NULL", quote_ident(column))),
            Self::IsNotNull(column) => Some(format!("{} IS NOT NULL", quote_ident(column))),
            Self::In { column, values } => Some(if values.is_empty() {
                String::from("1 = 0")
            } else {
                params.extend(values.iter().cloned());
                format!("{} IN ({})", quote_ident(column), placeholders(values.len()))
            }),
            Self::NotIn { column, values } => Some(if values.is_empty() {
                String::from("1 = 1")
            } else {
                params.extend(values.iter().cloned());
                format!(
                    "{} NOT IN ({})",
                    quote_ident(column),
                    placeholders(values.len())
                )
            }),
            Self::Like { column, pattern } => {
                params.push(SqlValue::Text(pattern.clone()));
                Some(format!("{} LIKE ?", quote_ident(column)))
            }
            Self::And(items) => join(items, " AND ", params),
            Self::Or(items) => join(items, " OR ", params),
            Self::Not(inner) => inner.to_sql(params).map(|sql| format!("NOT ({sql})")),
        }
    }

    /// Every column the predicate references.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Comparison { column, .. }
            | Self::IsNull(column)
            | Self::IsNotNull(column)
            | Self::In { column, .. }
            | Self::NotIn { column, .. }
            | Self::Like { column, .. } => out.push(column),
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_columns(out);
                }
            }
            Self::Not(inner) => inner.collect_columns(out),
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn join(items: &[Selector], sep: &str, params: &mut Vec<SqlValue>) -> Option<String> {
    let parts: Vec<String> = items.iter().filter_map(|item| item.to_sql(params)).collect();
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(
            parts
                .iter()
                .map(|p| format!("({p})"))
                .collect::<Vec<_>>()
                .join(sep),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_comparison() {
        let mut params = Vec::new();
        let sql = Selector::gte("age", 21).to_sql(&mut params).unwrap();
        assert_eq!(sql, "`age` >= ?");
        assert_eq!(params, vec![SqlValue::Int(21)]);
    }

    #[test]
    fn test_empty_groups_render_nothing() {
        let mut params = Vec::new();
        assert!(Selector::And(vec![]).to_sql(&mut params).is_none());
        assert!(Selector::And(vec![Selector::Or(vec![])]).not().to_sql(&mut params).is_none());
    }

    #[test]
    fn test_in_list_and_negation() {
        let mut params = Vec::new();
        let sql = Selector::in_list("role", vec!["admin", "staff"])
            .and(Selector::is_null("deleted_at").not())
            .to_sql(&mut params)
            .unwrap();
        assert_eq!(sql, "(`role` IN (?, ?)) AND (NOT (`deleted_at` IS NULL))");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_empty_in_list() {
        let mut params = Vec::new();
        let sql = Selector::in_list::<i64>("id", vec![]).to_sql(&mut params).unwrap();
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_columns_are_collected() {
        let s = Selector::eq("a", 1)
            .or(Selector::like("b", "x%"))
            .and(Selector::not_in("c", vec![1, 2]).not());
        assert_eq!(s.columns(), vec!["a", "b", "c"]);
    }
}
