//! Load requests and their resolved plans
//!
//! A `LoadRequest` names the root table and a tree of includes. Resolving it
//! looks up every relation, checks the tree against the batch configuration,
//! and runs every filter through the translation guard, so a plan only ever
//! carries store-native predicates.

use std::collections::HashMap;

use crate::{
    backends::{ColumnRef, StoreQuery},
    conditions::{Predicate, StorePredicate, TranslationGuard},
    error::{ModelError, ModelResult},
    hydration::Entity,
    loading::batch_loader::BatchConfig,
    model::table_schema,
    query::OrderBy,
    relationships::{find_relation, RelationDef},
};

/// One relation to load alongside its parent
#[derive(Debug, Clone)]
pub struct Include {
    pub relation: String,
    pub alias: Option<String>,
    pub filter: Option<Predicate>,
    pub order: Vec<OrderBy>,
    pub nested: Vec<Include>,
}

impl Include {
    pub fn new(relation: &str) -> Self {
        Self {
            relation: relation.to_string(),
            alias: None,
            filter: None,
            order: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// Store the collection under `alias` instead of the relation name
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn include(mut self, nested: Include) -> Self {
        self.nested.push(nested);
        self
    }

    pub fn alias_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.relation)
    }
}

/// A graph-load request
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub root_table: String,
    pub filter: Option<Predicate>,
    pub order: Vec<OrderBy>,
    pub includes: Vec<Include>,
}

impl LoadRequest {
    pub fn new(root_table: &str) -> Self {
        Self {
            root_table: root_table.to_string(),
            filter: None,
            order: Vec::new(),
            includes: Vec::new(),
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn include(mut self, include: Include) -> Self {
        self.includes.push(include);
        self
    }

    /// Nesting depth of the include tree
    pub fn depth(&self) -> usize {
        fn depth(includes: &[Include]) -> usize {
            includes.iter().map(|i| 1 + depth(&i.nested)).max().unwrap_or(0)
        }
        depth(&self.includes)
    }
}

/// A resolved include
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub alias: String,
    pub relation: &'static RelationDef,
    /// Store-native filter on the relation's child table, qualified with the
    /// child table name
    pub filter: Option<StorePredicate>,
    pub order: Vec<OrderBy>,
    pub children: Vec<PlanNode>,
}

/// A validated request whose filters are all store-native
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub root_table: String,
    pub root_filter: Option<StorePredicate>,
    pub root_order: Vec<OrderBy>,
    pub nodes: Vec<PlanNode>,
    pub depth: usize,
}

impl LoadPlan {
    /// Resolve and validate a request. Fails before any store access when a
    /// relation is unknown, the tree is too deep, or a filter is not
    /// translatable.
    pub fn resolve(
        request: &LoadRequest,
        guard: &TranslationGuard<'_>,
        config: &BatchConfig,
    ) -> ModelResult<Self> {
        if !Entity::is_loadable(&request.root_table) {
            return Err(ModelError::Query(format!(
                "Table '{}' cannot be loaded as a graph root",
                request.root_table
            )));
        }

        let depth = request.depth();
        if depth > config.max_depth {
            return Err(ModelError::Configuration(format!(
                "Include depth {} exceeds the configured maximum of {}",
                depth, config.max_depth
            )));
        }

        check_order(&request.root_table, &request.order)?;
        let root_filter = request
            .filter
            .as_ref()
            .map(|f| guard.translate(f, &request.root_table))
            .transpose()?;

        let mut aliases = HashMap::new();
        let nodes = resolve_level(&request.root_table, &request.includes, guard, &mut aliases)?;

        Ok(Self {
            root_table: request.root_table.clone(),
            root_filter,
            root_order: request.order.clone(),
            nodes,
            depth,
        })
    }

    /// Query for the root rows alone
    pub fn root_query(&self) -> ModelResult<StoreQuery> {
        let schema = table_schema(&self.root_table)
            .ok_or_else(|| ModelError::Query(format!("Unknown table '{}'", self.root_table)))?;
        let mut query = StoreQuery::from(&self.root_table, &schema.column_names())
            .filter(self.root_filter.clone());
        for o in &self.root_order {
            query = query.order_by(ColumnRef::new(&self.root_table, &o.column), o.direction);
        }
        Ok(query)
    }

    /// Every node of the tree, depth first
    pub fn walk(&self) -> Vec<&PlanNode> {
        fn walk<'a>(nodes: &'a [PlanNode], out: &mut Vec<&'a PlanNode>) {
            for node in nodes {
                out.push(node);
                walk(&node.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }
}

fn check_order(table: &str, order: &[OrderBy]) -> ModelResult<()> {
    let schema = table_schema(table)
        .ok_or_else(|| ModelError::Query(format!("Unknown table '{}'", table)))?;
    for o in order {
        if schema.column(&o.column).is_none() {
            return Err(ModelError::Query(format!(
                "Cannot order '{}' by unknown column '{}'",
                table, o.column
            )));
        }
    }
    Ok(())
}

/// Resolve the includes of one parent table.
///
/// Aliases are the graph's collection names. Siblings need distinct aliases;
/// an alias may reappear elsewhere in the tree only for the same unfiltered
/// relation, where every occurrence yields the same collection.
fn resolve_level(
    parent_table: &str,
    includes: &[Include],
    guard: &TranslationGuard<'_>,
    aliases: &mut HashMap<String, (&'static RelationDef, bool)>,
) -> ModelResult<Vec<PlanNode>> {
    let mut siblings: Vec<&str> = Vec::with_capacity(includes.len());
    let mut nodes = Vec::with_capacity(includes.len());

    for include in includes {
        let relation = find_relation(parent_table, &include.relation)?;
        let alias = include.alias_name();

        if siblings.contains(&alias) {
            return Err(ModelError::Configuration(format!(
                "Alias '{}' is used twice under '{}'",
                alias, parent_table
            )));
        }
        siblings.push(alias);

        let filtered = include.filter.is_some();
        if let Some((seen, seen_filtered)) = aliases.get(alias).copied() {
            if seen != relation || filtered || seen_filtered {
                return Err(ModelError::Configuration(format!(
                    "Alias '{}' is reused for a different or filtered relation",
                    alias
                )));
            }
        } else {
            aliases.insert(alias.to_string(), (relation, filtered));
        }

        check_order(relation.child_table, &include.order)?;
        let filter = include
            .filter
            .as_ref()
            .map(|f| guard.translate(f, relation.child_table))
            .transpose()?;

        let children = resolve_level(relation.child_table, &include.nested, guard, aliases)?;

        nodes.push(PlanNode {
            alias: alias.to_string(),
            relation,
            filter,
            order: include.order.clone(),
            children,
        });
    }

    Ok(nodes)
}
