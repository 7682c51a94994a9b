//! Single-query loading
//!
//! The whole include tree becomes one LEFT JOIN query. Every joined table is
//! qualified by its depth-first position (`j0`, `j1`, `j1_pivot`), never by
//! include names, so qualifiers stay unique and short. Include filters move
//! into the join condition so parents without matching children survive, and
//! the flat rows are deduplicated back into per-relation child mappings.
//! Sibling collections multiply the row count; the result is still exact,
//! only larger.

use std::collections::{HashMap, HashSet};

use crate::{
    backends::{ColumnRef, RelationalStore, StoreQuery, StoreRow},
    error::{OrmError, OrmResult},
    hydration::{ChildMap, Entity, GraphRecomposer, LoadedRelation, ObjectGraph},
    loading::plan::{LoadPlan, PlanNode},
    model::{table_schema, EntityId},
    query::{JoinType, OrderDirection},
    relationships::RelationKind,
};

/// A plan node placed in the joined query
struct JoinedNode<'p> {
    node: &'p PlanNode,
    /// Qualifier of the parent's columns
    parent: String,
    /// Qualifier of this node's columns
    path: String,
    /// Qualifier of the association row, many-to-many only
    pivot: Option<String>,
}

/// Child mapping of one node under construction
#[derive(Default)]
struct Collected {
    parent_ids: Vec<EntityId>,
    parents_seen: HashSet<EntityId>,
    pairs_seen: HashSet<(EntityId, EntityId)>,
    children: ChildMap,
}

/// Loads a plan with exactly one store round trip
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinedLoader;

impl JoinedLoader {
    pub fn new() -> Self {
        Self
    }

    pub async fn load<S: RelationalStore + ?Sized>(
        &self,
        store: &S,
        plan: &LoadPlan,
    ) -> OrmResult<ObjectGraph> {
        let mut joined = Vec::new();
        place(&plan.nodes, &plan.root_table, &mut joined);

        let query = joined_query(plan, &joined)?;
        let rows = store.execute(&query).await?;

        let mut roots = Vec::new();
        let mut roots_seen = HashSet::new();
        let mut collected: Vec<Collected> = joined.iter().map(|_| Collected::default()).collect();
        // Qualifier → id of the entity it holds in the current row
        let mut current: HashMap<&str, Option<EntityId>> = HashMap::new();

        for row in &rows {
            current.clear();
            let root = Entity::decode(&plan.root_table, row)?;
            current.insert(plan.root_table.as_str(), Some(root.id()));
            if roots_seen.insert(root.id()) {
                roots.push(root);
            }

            for (placed, collected) in joined.iter().zip(collected.iter_mut()) {
                let parent = current.get(placed.parent.as_str()).copied().flatten();
                let child = match parent {
                    Some(parent) => collect_child(placed, row, parent, collected)?,
                    None => None,
                };
                current.insert(placed.path.as_str(), child);
            }
        }

        let distinct = roots.len()
            + collected
                .iter()
                .map(|c| c.pairs_seen.len())
                .sum::<usize>();
        if rows.len() > distinct {
            tracing::warn!(
                rows = rows.len(),
                distinct,
                "joined load returned duplicated rows; sibling collections multiply the result"
            );
        }

        let relations = joined
            .iter()
            .zip(collected)
            .map(|(placed, collected)| LoadedRelation {
                alias: placed.node.alias.clone(),
                relation: placed.node.relation,
                parent_ids: collected.parent_ids,
                children: collected.children,
            })
            .collect();

        Ok(GraphRecomposer::attach(&plan.root_table, roots, relations))
    }
}

/// Assign join qualifiers depth first
fn place<'p>(nodes: &'p [PlanNode], parent: &str, out: &mut Vec<JoinedNode<'p>>) {
    for node in nodes {
        let path = format!("j{}", out.len());
        let pivot = match node.relation.kind {
            RelationKind::ManyToMany => Some(format!("{}_pivot", path)),
            _ => None,
        };
        out.push(JoinedNode {
            node,
            parent: parent.to_string(),
            path: path.clone(),
            pivot,
        });
        place(&node.children, &path, out);
    }
}

fn columns_of(table: &str) -> OrmResult<Vec<&'static str>> {
    table_schema(table)
        .map(|schema| schema.column_names())
        .ok_or_else(|| OrmError::Query(format!("Unknown table '{}'", table)))
}

/// Build the one query: root, then a LEFT JOIN per node in depth-first order,
/// sorted so each collection keeps its requested order
fn joined_query(plan: &LoadPlan, joined: &[JoinedNode<'_>]) -> OrmResult<StoreQuery> {
    let mut query = plan
        .root_query()?
        .order_by(ColumnRef::new(&plan.root_table, "id"), OrderDirection::Asc);

    for placed in joined {
        let relation = placed.node.relation;
        let columns = columns_of(relation.child_table)?;
        let condition = placed
            .node
            .filter
            .as_ref()
            .map(|f| f.requalify(relation.child_table, &placed.path));

        query = match relation.kind {
            RelationKind::HasMany => query.join_as(
                JoinType::Left,
                relation.child_table,
                &placed.path,
                &columns,
                ColumnRef::new(&placed.parent, "id"),
                relation.foreign_key,
                condition,
            ),
            RelationKind::BelongsTo => query.join_as(
                JoinType::Left,
                relation.child_table,
                &placed.path,
                &columns,
                ColumnRef::new(&placed.parent, relation.foreign_key),
                "id",
                condition,
            ),
            RelationKind::ManyToMany => {
                let pivot = relation.pivot()?;
                let pivot_alias = placed.pivot.as_deref().unwrap_or(pivot.table);
                query
                    .join_as(
                        JoinType::Left,
                        pivot.table,
                        pivot_alias,
                        &[pivot.near_key, pivot.far_key],
                        ColumnRef::new(&placed.parent, "id"),
                        pivot.near_key,
                        None,
                    )
                    .join_as(
                        JoinType::Left,
                        relation.child_table,
                        &placed.path,
                        &columns,
                        ColumnRef::new(pivot_alias, pivot.far_key),
                        "id",
                        condition,
                    )
            }
        };

        for o in &placed.node.order {
            query = query.order_by(ColumnRef::new(&placed.path, &o.column), o.direction);
        }
        query = query.order_by(ColumnRef::new(&placed.path, "id"), OrderDirection::Asc);
    }

    Ok(query)
}

/// Record the child a row carries for `placed`, returning its id
fn collect_child(
    placed: &JoinedNode<'_>,
    row: &StoreRow,
    parent: EntityId,
    collected: &mut Collected,
) -> OrmResult<Option<EntityId>> {
    let node = placed.node;
    let relation = node.relation;

    if collected.parents_seen.insert(parent) {
        collected.parent_ids.push(parent);
    }

    if row.is_null_entity(&placed.path) {
        let dangling = match relation.kind {
            RelationKind::HasMany => false,
            RelationKind::BelongsTo => true,
            RelationKind::ManyToMany => placed
                .pivot
                .as_deref()
                .is_some_and(|pivot| !row.is_null_entity(pivot)),
        };
        if dangling && node.filter.is_none() {
            return Err(OrmError::ReferentialViolation(format!(
                "{} of {} {} references no {} row",
                relation.qualified_name(),
                relation.parent_table,
                parent,
                relation.child_table
            )));
        }
        return Ok(None);
    }

    let child = Entity::decode(relation.child_table, &row.project(&placed.path, relation.child_table))?;
    let id = child.id();
    if collected.pairs_seen.insert((parent, id)) {
        collected.children.entry(parent).or_default().push(child);
    }
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::TranslationGuard;
    use crate::loading::batch_loader::BatchConfig;
    use crate::loading::plan::{Include, LoadRequest};

    #[test]
    fn test_join_qualifiers_follow_depth_first_position() {
        let request = LoadRequest::new("studios").include(
            Include::new("products")
                .include(Include::new("prices"))
                .include(Include::new("sellers")),
        );
        let plan = LoadPlan::resolve(&request, &TranslationGuard::new(), &BatchConfig::default())
            .unwrap();

        let mut joined = Vec::new();
        place(&plan.nodes, &plan.root_table, &mut joined);
        let paths: Vec<&str> = joined.iter().map(|j| j.path.as_str()).collect();
        assert_eq!(paths, vec!["j0", "j1", "j2"]);
        assert_eq!(joined[1].parent, "j0");
        assert_eq!(joined[2].pivot.as_deref(), Some("j2_pivot"));

        let query = joined_query(&plan, &joined).unwrap();
        // one join per node plus the association table
        assert_eq!(query.joins.len(), 4);
        assert_eq!(query.joins[0].left, ColumnRef::new("studios", "id"));
    }

    #[test]
    fn test_include_names_never_reach_qualifiers() {
        // an alias that looks like a nested path must not collide with one
        let request = LoadRequest::new("studios")
            .include(
                Include::new("products")
                    .alias("p")
                    .include(Include::new("prices").alias("x")),
            )
            .include(Include::new("products").alias("p__x"));
        let plan = LoadPlan::resolve(&request, &TranslationGuard::new(), &BatchConfig::default())
            .unwrap();

        let mut joined = Vec::new();
        place(&plan.nodes, &plan.root_table, &mut joined);
        let paths: HashSet<&str> = joined.iter().map(|j| j.path.as_str()).collect();
        assert_eq!(paths.len(), joined.len());
        assert!(paths.iter().all(|p| p.len() < 63));
    }
}
