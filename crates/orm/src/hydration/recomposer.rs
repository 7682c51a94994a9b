//! Graph recomposition
//!
//! Merges independently fetched result sets into one `ObjectGraph`. This is a
//! purely local step: no store access, no runtime errors.

use std::collections::BTreeMap;

use super::graph::{Entity, ObjectGraph};
use crate::model::EntityId;
use crate::relationships::RelationDef;

/// Children of one relation grouped by parent key, each group in fetch order
pub type ChildMap = BTreeMap<EntityId, Vec<Entity>>;

/// One relation's fetched children, ready to be attached
#[derive(Debug, Clone)]
pub struct LoadedRelation {
    /// Name the collection is stored under in the graph
    pub alias: String,
    pub relation: &'static RelationDef,
    /// Parents the relation was loaded for, in parent order
    pub parent_ids: Vec<EntityId>,
    /// Parent key → children. For belongs-to relations the key is the parent
    /// id as well, so every mapping is keyed the same way.
    pub children: ChildMap,
}

/// Stitches parents and child mappings into an object graph
#[derive(Debug)]
pub struct GraphRecomposer {
    graph: ObjectGraph,
}

impl GraphRecomposer {
    pub fn new(root_table: &str) -> Self {
        Self {
            graph: ObjectGraph::new(root_table),
        }
    }

    /// Recompose a graph in one step
    pub fn attach(
        root_table: &str,
        parents: Vec<Entity>,
        relations: Vec<LoadedRelation>,
    ) -> ObjectGraph {
        let mut recomposer = Self::new(root_table);
        recomposer.add_roots(parents);
        for relation in relations {
            recomposer.attach_relation(relation);
        }
        recomposer.finish()
    }

    pub fn add_roots(&mut self, parents: Vec<Entity>) {
        for parent in parents {
            let id = self.graph.insert(parent);
            self.graph.roots.push(id);
        }
    }

    /// Give every listed parent a collection under the relation's alias, empty
    /// when the mapping has no entry for it
    pub fn attach_relation(&mut self, loaded: LoadedRelation) {
        let LoadedRelation {
            alias,
            relation,
            parent_ids,
            mut children,
        } = loaded;

        debug_assert!(
            children.keys().all(|k| parent_ids.contains(k)),
            "child mapping of {} keyed outside its parent set",
            relation.qualified_name()
        );

        let mut attached = 0usize;
        for parent in parent_ids {
            let ids: Vec<EntityId> = children
                .remove(&parent)
                .unwrap_or_default()
                .into_iter()
                .map(|child| self.graph.insert(child))
                .collect();
            attached += ids.len();
            self.graph
                .collections
                .entry(alias.clone())
                .or_default()
                .insert(parent, ids);
        }

        tracing::trace!(
            relation = %relation.qualified_name(),
            alias = %alias,
            attached,
            "relation attached"
        );
    }

    pub fn finish(self) -> ObjectGraph {
        self.graph
    }
}
