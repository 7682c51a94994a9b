//! Query splitter
//!
//! Loads a plan as one root query followed by one batched lookup per
//! relation, level by level, and hands the results to the recomposer. Row
//! counts grow with the sum of the collection sizes, never their product.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use futures::future::try_join_all;

use crate::{
    backends::RelationalStore,
    error::{OrmError, OrmResult},
    hydration::{ChildMap, Entity, GraphRecomposer, LoadedRelation, ObjectGraph},
    loading::batch_loader::{BatchLoader, ChildRows},
    loading::plan::{LoadPlan, PlanNode},
    model::EntityId,
    relationships::RelationKind,
};

/// How the key set of a relation is sent to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBatching {
    /// One lookup for the whole key set
    Batched,
    /// One lookup per key (the N+1 pattern)
    PerParent,
}

/// A relation waiting to be loaded for a known set of parents
struct Pending<'p> {
    node: &'p PlanNode,
    parents: Vec<Entity>,
}

/// Splits a multi-relation load into independently scoped queries
#[derive(Debug, Clone, Copy)]
pub struct QuerySplitter<'a> {
    loader: &'a BatchLoader,
    batching: KeyBatching,
}

impl<'a> QuerySplitter<'a> {
    pub fn new(loader: &'a BatchLoader, batching: KeyBatching) -> Self {
        Self { loader, batching }
    }

    /// Load the whole plan. Any failing query fails the load; nothing is
    /// recomposed until every query has succeeded.
    pub async fn load<S: RelationalStore + ?Sized>(
        &self,
        store: &S,
        plan: &LoadPlan,
    ) -> OrmResult<ObjectGraph> {
        let rows = store.execute(&plan.root_query()?).await?;
        let roots = rows
            .iter()
            .map(|row| Entity::decode(&plan.root_table, row))
            .collect::<OrmResult<Vec<_>>>()?;
        tracing::debug!(table = %plan.root_table, rows = roots.len(), "root query");

        let mut relations = Vec::new();
        let mut frontier: Vec<Pending<'_>> = plan
            .nodes
            .iter()
            .map(|node| Pending {
                node,
                parents: roots.clone(),
            })
            .collect();

        while !frontier.is_empty() {
            let loaded = if self.loader.config().parallel_siblings {
                try_join_all(frontier.iter().map(|p| self.load_relation(store, p))).await?
            } else {
                let mut loaded = Vec::with_capacity(frontier.len());
                for pending in &frontier {
                    loaded.push(self.load_relation(store, pending).await?);
                }
                loaded
            };

            let mut next = Vec::new();
            for (pending, relation) in frontier.iter().zip(loaded) {
                if !pending.node.children.is_empty() {
                    let children = distinct_children(&relation.children, &relation.parent_ids);
                    for child in &pending.node.children {
                        next.push(Pending {
                            node: child,
                            parents: children.clone(),
                        });
                    }
                }
                relations.push(relation);
            }
            frontier = next;
        }

        Ok(GraphRecomposer::attach(&plan.root_table, roots, relations))
    }

    async fn load_relation<S: RelationalStore + ?Sized>(
        &self,
        store: &S,
        pending: &Pending<'_>,
    ) -> OrmResult<LoadedRelation> {
        let node = pending.node;
        let relation = node.relation;

        let mut parent_ids = Vec::with_capacity(pending.parents.len());
        let mut seen = HashSet::new();
        for parent in &pending.parents {
            if seen.insert(parent.id()) {
                parent_ids.push(parent.id());
            }
        }

        let mut children = ChildMap::new();
        match relation.kind {
            RelationKind::HasMany | RelationKind::ManyToMany => {
                let keys: BTreeSet<EntityId> = parent_ids.iter().copied().collect();
                for (key, rows) in self.fetch(store, &keys, node).await? {
                    let decoded = rows
                        .iter()
                        .map(|row| Entity::decode(relation.child_table, row))
                        .collect::<OrmResult<Vec<_>>>()?;
                    children.insert(key, decoded);
                }
            }
            RelationKind::BelongsTo => {
                let mut references = BTreeMap::new();
                for parent in &pending.parents {
                    let key = parent.foreign_key(relation.foreign_key).ok_or_else(|| {
                        OrmError::Query(format!(
                            "{} has no foreign key '{}'",
                            parent.table(),
                            relation.foreign_key
                        ))
                    })?;
                    references.insert(parent.id(), key);
                }

                let keys: BTreeSet<EntityId> = references.values().copied().collect();
                let fetched = self.fetch(store, &keys, node).await?;

                for (parent, key) in references {
                    match fetched.get(&key).and_then(|rows| rows.first()) {
                        Some(row) => {
                            children.insert(parent, vec![Entity::decode(relation.child_table, row)?]);
                        }
                        // a filtered belongs-to may legitimately resolve to nothing
                        None if node.filter.is_some() => {}
                        None => {
                            return Err(OrmError::ReferentialViolation(format!(
                                "{}.{} = {} of {} {} has no matching row",
                                relation.parent_table,
                                relation.foreign_key,
                                key,
                                relation.parent_table,
                                parent
                            )))
                        }
                    }
                }
            }
        }

        Ok(LoadedRelation {
            alias: node.alias.clone(),
            relation,
            parent_ids,
            children,
        })
    }

    async fn fetch<S: RelationalStore + ?Sized>(
        &self,
        store: &S,
        keys: &BTreeSet<EntityId>,
        node: &PlanNode,
    ) -> OrmResult<ChildRows> {
        match self.batching {
            KeyBatching::Batched => {
                self.loader
                    .fetch_children_by_parent_keys(
                        store,
                        keys,
                        node.relation,
                        node.filter.as_ref(),
                        &node.order,
                    )
                    .await
            }
            KeyBatching::PerParent => {
                let mut grouped = ChildRows::new();
                for key in keys {
                    let single = BTreeSet::from([*key]);
                    grouped.extend(
                        self.loader
                            .fetch_children_by_parent_keys(
                                store,
                                &single,
                                node.relation,
                                node.filter.as_ref(),
                                &node.order,
                            )
                            .await?,
                    );
                }
                Ok(grouped)
            }
        }
    }
}

/// Children of a relation in parent order, each entity once
fn distinct_children(children: &ChildMap, parent_ids: &[EntityId]) -> Vec<Entity> {
    let mut seen = HashSet::new();
    parent_ids
        .iter()
        .filter_map(|parent| children.get(parent))
        .flatten()
        .filter(|child| seen.insert(child.id()))
        .cloned()
        .collect()
}
