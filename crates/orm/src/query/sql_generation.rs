//! Store query SQL generation
//!
//! Renders a `StoreQuery` to PostgreSQL with `$n` placeholders. Every selected
//! column is aliased `"table.column"` so the adapter can rebuild a qualified
//! `StoreRow` whatever the join shape.

use crate::backends::{ColumnRef, StoreQuery, StoreValue};
use crate::conditions::StorePredicate;

impl StoreQuery {
    /// Generate SQL from the query with parameter placeholders and return the
    /// parameters in placeholder order
    pub fn to_sql_with_params(&self) -> (String, Vec<StoreValue>) {
        let mut sql = String::new();
        let mut params = Vec::new();

        sql.push_str("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            let fields: Vec<String> = self
                .select
                .iter()
                .map(|c| format!("{} AS {}", qualified(c), quote(&c.to_string())))
                .collect();
            sql.push_str(&fields.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&quote(&self.table));

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.join_type.to_string());
            sql.push(' ');
            sql.push_str(&quote(&join.table));
            if join.alias != join.table {
                sql.push_str(" AS ");
                sql.push_str(&quote(&join.alias));
            }
            sql.push_str(&format!(" ON {} = {}", qualified(&join.left), qualified(&join.right)));
            if let Some(condition) = &join.condition {
                sql.push_str(" AND ");
                render_predicate(condition, &mut sql, &mut params);
            }
        }

        self.build_where_clause(&mut sql, &mut params);

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(c, dir)| format!("{} {}", qualified(c), dir))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        (sql, params)
    }

    fn build_where_clause(&self, sql: &mut String, params: &mut Vec<StoreValue>) {
        let mut conditions = Vec::new();
        if let Some(scope) = &self.scope {
            conditions.push(if scope.keys.is_empty() {
                StorePredicate::False
            } else {
                StorePredicate::In {
                    column: scope.column.clone(),
                    values: scope.keys.clone(),
                }
            });
        }
        if let Some(filter) = &self.filter {
            conditions.push(filter.clone());
        }
        if conditions.is_empty() {
            return;
        }

        sql.push_str(" WHERE ");
        for (i, condition) in conditions.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            render_predicate(condition, sql, params);
        }
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn qualified(column: &ColumnRef) -> String {
    format!("{}.{}", quote(&column.table), quote(&column.column))
}

fn placeholder(value: StoreValue, params: &mut Vec<StoreValue>) -> String {
    params.push(value);
    format!("${}", params.len())
}

/// Escape `LIKE` wildcards so the needle matches literally
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn render_predicate(predicate: &StorePredicate, sql: &mut String, params: &mut Vec<StoreValue>) {
    match predicate {
        StorePredicate::True => sql.push_str("TRUE"),
        StorePredicate::False => sql.push_str("FALSE"),
        StorePredicate::Compare { column, op, value } => {
            let p = placeholder(value.clone(), params);
            sql.push_str(&format!("{} {} {}", qualified(column), op, p));
        }
        StorePredicate::And(parts) | StorePredicate::Or(parts) => {
            let (joiner, empty) = if matches!(predicate, StorePredicate::And(_)) {
                (" AND ", "TRUE")
            } else {
                (" OR ", "FALSE")
            };
            if parts.is_empty() {
                sql.push_str(empty);
                return;
            }
            sql.push('(');
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    sql.push_str(joiner);
                }
                render_predicate(part, sql, params);
            }
            sql.push(')');
        }
        StorePredicate::Not(inner) => {
            sql.push_str("NOT (");
            render_predicate(inner, sql, params);
            sql.push(')');
        }
        StorePredicate::In { column, values } => {
            if values.is_empty() {
                sql.push_str("FALSE");
                return;
            }
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| placeholder(v.clone(), params))
                .collect();
            sql.push_str(&format!("{} IN ({})", qualified(column), placeholders.join(", ")));
        }
        StorePredicate::Contains { column, needle } => {
            let p = placeholder(StoreValue::Text(like_pattern(needle)), params);
            sql.push_str(&format!("{} LIKE {} ESCAPE '\\'", qualified(column), p));
        }
        StorePredicate::IsNull(column) => {
            sql.push_str(&format!("{} IS NULL", qualified(column)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::{JoinType, OrderDirection, QueryOperator};

    #[test]
    fn test_scoped_child_query() {
        let query = StoreQuery::from("prices", &["id", "product_id", "value"])
            .scoped(
                ColumnRef::new("prices", "product_id"),
                vec![StoreValue::Int32(1), StoreValue::Int32(2)],
            )
            .order_by(ColumnRef::new("prices", "id"), OrderDirection::Asc);

        let (sql, params) = query.to_sql_with_params();
        assert_eq!(
            sql,
            "SELECT \"prices\".\"id\" AS \"prices.id\", \"prices\".\"product_id\" AS \"prices.product_id\", \
             \"prices\".\"value\" AS \"prices.value\" FROM \"prices\" \
             WHERE \"prices\".\"product_id\" IN ($1, $2) ORDER BY \"prices\".\"id\" ASC"
        );
        assert_eq!(params, vec![StoreValue::Int32(1), StoreValue::Int32(2)]);
    }

    #[test]
    fn test_aliased_join_with_condition() {
        let condition = StorePredicate::Contains {
            column: ColumnRef::new("infinity", "name"),
            needle: "Infinity".into(),
        };
        let query = StoreQuery::from("studios", &["id"]).join_as(
            JoinType::Left,
            "products",
            "infinity",
            &["id"],
            ColumnRef::new("studios", "id"),
            "studio_id",
            Some(condition),
        );

        let (sql, params) = query.to_sql_with_params();
        assert!(sql.contains(
            "LEFT JOIN \"products\" AS \"infinity\" ON \"studios\".\"id\" = \"infinity\".\"studio_id\" \
             AND \"infinity\".\"name\" LIKE $1 ESCAPE '\\'"
        ));
        assert_eq!(params, vec![StoreValue::Text("%Infinity%".into())]);
    }

    #[test]
    fn test_empty_scope_renders_false() {
        let query = StoreQuery::from("prices", &["id"])
            .scoped(ColumnRef::new("prices", "product_id"), Vec::new())
            .filter(Some(StorePredicate::Compare {
                column: ColumnRef::new("prices", "id"),
                op: QueryOperator::GreaterThan,
                value: StoreValue::Int32(5),
            }));

        let (sql, params) = query.to_sql_with_params();
        assert!(sql.ends_with("WHERE FALSE AND \"prices\".\"id\" > $1"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
