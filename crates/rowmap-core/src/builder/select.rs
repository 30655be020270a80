//! SELECT and paired COUNT statements.

use super::{quote_ident, OrderBy};
use crate::filter::Selector;
use crate::value::SqlValue;

/// A list query: the page SELECT, the matching COUNT and their shared arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSql {
    /// SELECT with ordering and pagination.
    pub select: String,
    /// COUNT over the same predicate, without pagination.
    pub count: String,
    /// Arguments for either statement.
    pub params: Vec<SqlValue>,
}

/// SELECT builder.
#[derive(Debug, Clone, Default)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    selector: Option<Selector>,
    order_by: Vec<OrderBy>,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl Select {
    /// Selects from `table`.
    #[must_use]
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    /// Projected columns; all columns (`*`) when empty.
    #[must_use]
    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// WHERE predicate.
    #[must_use]
    pub fn filter(mut self, selector: Option<Selector>) -> Self {
        self.selector = selector;
        self
    }

    /// ORDER BY terms, applied in the given order.
    #[must_use]
    pub fn order_by(mut self, order: Vec<OrderBy>) -> Self {
        self.order_by = order;
        self
    }

    /// OFFSET / LIMIT.
    #[must_use]
    pub const fn paginate(mut self, offset: Option<u64>, limit: Option<u64>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    fn where_clause(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        if let Some(clause) = self.selector.as_ref().and_then(|s| s.to_sql(params)) {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
    }

    /// Builds the SELECT.
    #[must_use]
    pub fn build(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
            sql.push_str(&cols.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&quote_ident(&self.table));

        self.where_clause(&mut sql, &mut params);

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self.order_by.iter().map(OrderBy::to_sql).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        let paging = match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (None, Some(offset)) => format!(" LIMIT -1 OFFSET {offset}"),
            (None, None) => String::new(),
        };
        sql.push_str(&paging);

        (sql, params)
    }

    /// Builds the COUNT over the same predicate.
    #[must_use]
    pub fn build_count(&self) -> (String, Vec<SqlValue>) {
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table));
        let mut params = Vec::new();
        self.where_clause(&mut sql, &mut params);
        (sql, params)
    }

    /// Builds the SELECT and COUNT pair.
    #[must_use]
    pub fn build_list(&self) -> ListSql {
        let (select, params) = self.build();
        let (count, _) = self.build_count();
        ListSql {
            select,
            count,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_all() {
        let (sql, params) = Select::from("user").build();
        assert_eq!(sql, "SELECT * FROM `user`");
        assert!(params.is_empty());
    }

    #[test]
    fn test_list_pair_shares_params() {
        let list = Select::from("user")
            .columns(&["id", "name"])
            .filter(Some(Selector::eq("active", true)))
            .order_by(vec![OrderBy::parse("-id"), OrderBy::parse("name")])
            .paginate(Some(20), Some(10))
            .build_list();
        assert_eq!(
            list.select,
            "SELECT `id`, `name` FROM `user` WHERE `active` = ? \
             ORDER BY `id` DESC, `name` ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(list.count, "SELECT COUNT(*) FROM `user` WHERE `active` = ?");
        assert_eq!(list.params, vec![SqlValue::Bool(true)]);
    }

    #[test]
    fn test_no_implicit_order() {
        let (sql, _) = Select::from("t").paginate(None, Some(5)).build();
        assert_eq!(sql, "SELECT * FROM `t` LIMIT 5");
    }

    #[test]
    fn test_offset_without_limit() {
        let (sql, _) = Select::from("t").paginate(Some(3), None).build();
        assert_eq!(sql, "SELECT * FROM `t` LIMIT -1 OFFSET 3");
    }

    #[test]
    fn test_empty_selector_has_no_where() {
        let (sql, _) = Select::from("t").filter(Some(Selector::And(vec![]))).build_count();
        assert_eq!(sql, "SELECT COUNT(*) FROM `t`");
    }
}
