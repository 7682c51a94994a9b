//! Predicate Translation Guard
//!
//! Every caller predicate passes through `TranslationGuard::translate` before a
//! query reaches the store. A predicate the store cannot evaluate is rejected
//! with `ModelError::NotTranslatable`; it is never evaluated in process after
//! materializing the table.

use crate::backends::{ColumnRef, StoreValue, ValueKind};
use crate::error::{ModelError, OrmResult};
use crate::model::{TableSchema, CATALOG};
use crate::query::types::QueryOperator;

use super::predicate::{Predicate, StorePredicate};

/// Validates caller predicates against the table schemas and lowers them to
/// `StorePredicate`
#[derive(Debug, Clone, Copy)]
pub struct TranslationGuard<'a> {
    catalog: &'a [TableSchema],
}

impl Default for TranslationGuard<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationGuard<'static> {
    /// Guard over the studio catalogue
    pub fn new() -> Self {
        Self { catalog: CATALOG }
    }
}

impl<'a> TranslationGuard<'a> {
    /// Translate a predicate filtering rows of `table`
    pub fn translate(&self, predicate: &Predicate, table: &str) -> OrmResult<StorePredicate> {
        self.translate_as(predicate, table, table)
    }

    /// Translate a predicate filtering rows of `table`, qualifying the
    /// resulting columns with `alias` (the name the table is joined under)
    pub fn translate_as(
        &self,
        predicate: &Predicate,
        table: &str,
        alias: &str,
    ) -> OrmResult<StorePredicate> {
        let schema = self
            .catalog
            .iter()
            .find(|t| t.name == table)
            .ok_or_else(|| ModelError::Query(format!("Unknown table '{}'", table)))?;

        let translated = Scope { schema, alias }.lower(predicate)?;
        tracing::trace!(table, alias, ?translated, "predicate translated");
        Ok(translated)
    }
}

struct Scope<'s> {
    schema: &'s TableSchema,
    alias: &'s str,
}

impl Scope<'_> {
    fn lower(&self, predicate: &Predicate) -> OrmResult<StorePredicate> {
        match predicate {
            Predicate::Compare { column, op, value } => {
                let (column, kind) = self.resolve(column)?;
                if value.is_null() {
                    return match op {
                        QueryOperator::Equal => Ok(StorePredicate::IsNull(column)),
                        QueryOperator::NotEqual => {
                            Ok(StorePredicate::Not(Box::new(StorePredicate::IsNull(column))))
                        }
                        _ => Err(ModelError::not_translatable(format!(
                            "ordering comparison `{} {} NULL`",
                            column, op
                        ))),
                    };
                }
                self.check_kind(&column, kind, value)?;
                Ok(StorePredicate::Compare {
                    column,
                    op: *op,
                    value: value.clone(),
                })
            }
            Predicate::And(parts) => {
                let lowered = self.lower_all(parts)?;
                Ok(match lowered.len() {
                    0 => StorePredicate::True,
                    1 => lowered.into_iter().next().unwrap_or(StorePredicate::True),
                    _ => StorePredicate::And(lowered),
                })
            }
            Predicate::Or(parts) => {
                let lowered = self.lower_all(parts)?;
                Ok(match lowered.len() {
                    0 => StorePredicate::False,
                    1 => lowered.into_iter().next().unwrap_or(StorePredicate::False),
                    _ => StorePredicate::Or(lowered),
                })
            }
            Predicate::Not(inner) => Ok(match self.lower(inner)? {
                StorePredicate::True => StorePredicate::False,
                StorePredicate::False => StorePredicate::True,
                other => StorePredicate::Not(Box::new(other)),
            }),
            Predicate::In { column, values } => {
                let (column, kind) = self.resolve(column)?;
                let mut kept = Vec::with_capacity(values.len());
                for value in values {
                    // `x IN (NULL)` never holds
                    if value.is_null() {
                        continue;
                    }
                    self.check_kind(&column, kind, value)?;
                    kept.push(value.clone());
                }
                if kept.is_empty() {
                    Ok(StorePredicate::False)
                } else {
                    Ok(StorePredicate::In { column, values: kept })
                }
            }
            Predicate::Contains { column, needle } => {
                let (column, kind) = self.resolve(column)?;
                if kind != ValueKind::Text {
                    return Err(ModelError::not_translatable(format!(
                        "string containment on {} column `{}`",
                        kind, column
                    )));
                }
                Ok(StorePredicate::Contains {
                    column,
                    needle: needle.clone(),
                })
            }
            Predicate::IsNull(column) => {
                let (column, _) = self.resolve(column)?;
                Ok(StorePredicate::IsNull(column))
            }
            Predicate::HostFn { name, .. } => Err(ModelError::not_translatable(format!(
                "host function `{}`",
                name
            ))),
        }
    }

    fn lower_all(&self, parts: &[Predicate]) -> OrmResult<Vec<StorePredicate>> {
        parts.iter().map(|p| self.lower(p)).collect()
    }

    /// Check the column belongs to the filtered table and re-qualify it with
    /// the alias
    fn resolve(&self, column: &ColumnRef) -> OrmResult<(ColumnRef, ValueKind)> {
        if column.table != self.schema.name {
            return Err(ModelError::not_translatable(format!(
                "reference to `{}` from a filter on `{}`",
                column, self.schema.name
            )));
        }
        let def = self.schema.column(&column.column).ok_or_else(|| {
            ModelError::Query(format!(
                "Unknown column '{}' on table '{}'",
                column.column, self.schema.name
            ))
        })?;
        Ok((ColumnRef::new(self.alias, &column.column), def.kind))
    }

    fn check_kind(&self, column: &ColumnRef, kind: ValueKind, value: &StoreValue) -> OrmResult<()> {
        if kind.comparable_with(value.kind()) {
            Ok(())
        } else {
            Err(ModelError::not_translatable(format!(
                "comparison of {} column `{}` with {} value {}",
                kind,
                column,
                value.kind(),
                value
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_comparisons_and_combinators() {
        let guard = TranslationGuard::new();
        let predicate = Predicate::contains("products", "name", "Infinity")
            .and(Predicate::gte("products", "id", 10).or(Predicate::is_in("products", "studio_id", [1, 2])));

        let translated = guard.translate(&predicate, "products").unwrap();
        match translated {
            StorePredicate::And(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[1], StorePredicate::Or(_)));
            }
            other => panic!("unexpected translation {:?}", other),
        }
    }

    #[test]
    fn test_rejects_host_function() {
        let guard = TranslationGuard::new();
        let predicate = Predicate::eq("products", "studio_id", 1).and(Predicate::host_fn(
            "is_blockbuster",
            |row| row.get_text("products", "name").map(|n| n.len() > 7).unwrap_or(false),
        ));

        let err = guard.translate(&predicate, "products").unwrap_err();
        assert_eq!(
            err,
            ModelError::NotTranslatable {
                construct: "host function `is_blockbuster`".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_kind_mismatch_and_foreign_column() {
        let guard = TranslationGuard::new();

        let err = guard
            .translate(&Predicate::eq("prices", "value", "cheap"), "prices")
            .unwrap_err();
        assert!(matches!(err, ModelError::NotTranslatable { .. }));

        let err = guard
            .translate(&Predicate::contains("studios", "name", "1"), "products")
            .unwrap_err();
        assert!(matches!(err, ModelError::NotTranslatable { .. }));

        let err = guard
            .translate(&Predicate::contains("prices", "value", "4"), "prices")
            .unwrap_err();
        assert!(matches!(err, ModelError::NotTranslatable { .. }));
    }

    #[test]
    fn test_integer_compares_with_decimal_column() {
        let guard = TranslationGuard::new();
        assert!(guard
            .translate(&Predicate::lt("prices", "value", 50), "prices")
            .is_ok());
    }

    #[test]
    fn test_null_comparison_lowers_to_is_null() {
        let guard = TranslationGuard::new();
        let translated = guard
            .translate(&Predicate::eq("products", "name", StoreValue::Null), "products")
            .unwrap();
        assert_eq!(
            translated,
            StorePredicate::IsNull(ColumnRef::new("products", "name"))
        );
        assert!(guard
            .translate(&Predicate::gt("products", "name", StoreValue::Null), "products")
            .is_err());
    }

    #[test]
    fn test_empty_membership_is_false() {
        let guard = TranslationGuard::new();
        let translated = guard
            .translate(&Predicate::is_in("products", "id", Vec::<i32>::new()), "products")
            .unwrap();
        assert_eq!(translated, StorePredicate::False);
    }

    #[test]
    fn test_alias_requalifies_columns() {
        let guard = TranslationGuard::new();
        let translated = guard
            .translate_as(&Predicate::contains("products", "name", "Endgame"), "products", "endgame")
            .unwrap();
        assert_eq!(translated.columns(), vec![&ColumnRef::new("endgame", "name")]);
    }

    #[test]
    fn test_unknown_column_is_query_error() {
        let guard = TranslationGuard::new();
        let err = guard
            .translate(&Predicate::eq("products", "title", "x"), "products")
            .unwrap_err();
        assert!(matches!(err, ModelError::Query(_)));
    }
}
