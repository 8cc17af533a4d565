// SPDX-License-Identifier: MIT OR Apache-2.0
//! Projection tree - the lightweight mirror of the live entity graph shown
//! in the hierarchy panel.

use crate::ids::EntityId;
use crate::world::EntityAuthoring;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Projection tree errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Node does not exist
    #[error("Hierarchy node not found: {0}")]
    NodeNotFound(EntityId),

    /// A node for this entity already exists
    #[error("Hierarchy node already exists: {0}")]
    DuplicateNode(EntityId),
}

/// Projection of one live entity into the tree view
#[derive(Debug, Clone)]
pub struct HierarchyNode {
    /// Entity this node mirrors
    pub entity: EntityId,
    /// Projection parent (`None` for top-level nodes)
    pub parent: Option<EntityId>,
    /// Child nodes in display order
    pub children: Vec<EntityId>,
    /// Expanded in the tree view
    pub expanded: bool,
    /// Selected in the tree view
    pub selected: bool,
    /// Under the mouse cursor
    pub hovered: bool,
    /// Scratch mark used by drag and drop
    pub mark: bool,
    pre_move: Option<(Option<EntityId>, usize)>,
}

impl HierarchyNode {
    fn new(entity: EntityId, parent: Option<EntityId>, expanded: bool) -> Self {
        Self {
            entity,
            parent,
            children: Vec::new(),
            expanded,
            selected: false,
            hovered: false,
            mark: false,
            pre_move: None,
        }
    }

    /// Parent and row recorded just before the node was moved
    pub fn pre_move(&self) -> Option<(Option<EntityId>, usize)> {
        self.pre_move
    }
}

/// Nodes removed together with their projection position
#[derive(Debug, Clone)]
pub struct RemovedSubtree {
    /// Parent the subtree was removed from
    pub parent: Option<EntityId>,
    /// Row the subtree root occupied
    pub row: usize,
    /// Removed nodes, subtree root first
    pub nodes: Vec<HierarchyNode>,
}

/// The projection tree
#[derive(Debug, Clone, Default)]
pub struct HierarchyTree {
    nodes: HashMap<EntityId, HierarchyNode>,
    roots: Vec<EntityId>,
}

impl HierarchyTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a node exists
    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get a node
    pub fn node(&self, id: EntityId) -> Option<&HierarchyNode> {
        self.nodes.get(&id)
    }

    /// Get a mutable node
    pub fn node_mut(&mut self, id: EntityId) -> Option<&mut HierarchyNode> {
        self.nodes.get_mut(&id)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of a node (`None` = top level)
    pub fn children_of(&self, parent: Option<EntityId>) -> &[EntityId] {
        match parent {
            Some(parent) => self
                .nodes
                .get(&parent)
                .map(|n| n.children.as_slice())
                .unwrap_or(&[]),
            None => &self.roots,
        }
    }

    /// Projection parent of a node
    pub fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Row of a node within its parent
    pub fn row_of(&self, id: EntityId) -> Option<usize> {
        let node = self.nodes.get(&id)?;
        self.children_of(node.parent).iter().position(|c| *c == id)
    }

    /// Sibling immediately after a node
    pub fn next_sibling(&self, id: EntityId) -> Option<EntityId> {
        let node = self.nodes.get(&id)?;
        let siblings = self.children_of(node.parent);
        let row = siblings.iter().position(|c| *c == id)?;
        siblings.get(row + 1).copied()
    }

    /// Check whether `ancestor` is a strict ancestor of `id`
    pub fn is_ancestor(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent_of(parent);
        }
        false
    }

    /// All nodes in display order (parent before child)
    pub fn preorder(&self) -> Vec<EntityId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for root in &self.roots {
            self.collect_preorder(*root, &mut out);
        }
        out
    }

    /// A node and all of its descendants in display order
    pub fn subtree(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        if self.contains(id) {
            self.collect_preorder(id, &mut out);
        }
        out
    }

    fn collect_preorder(&self, id: EntityId, out: &mut Vec<EntityId>) {
        out.push(id);
        if let Some(node) = self.nodes.get(&id) {
            for child in &node.children {
                self.collect_preorder(*child, out);
            }
        }
    }

    /// Display-order position of every node
    pub fn preorder_positions(&self) -> HashMap<EntityId, usize> {
        self.preorder()
            .into_iter()
            .enumerate()
            .map(|(index, id)| (id, index))
            .collect()
    }

    fn siblings_mut(&mut self, parent: Option<EntityId>) -> Result<&mut Vec<EntityId>, TreeError> {
        match parent {
            Some(parent) => self
                .nodes
                .get_mut(&parent)
                .map(|n| &mut n.children)
                .ok_or(TreeError::NodeNotFound(parent)),
            None => Ok(&mut self.roots),
        }
    }

    /// Insert a single node under `parent` at `index` (clamped)
    pub fn insert_node(
        &mut self,
        entity: EntityId,
        parent: Option<EntityId>,
        index: usize,
        expanded: bool,
    ) -> Result<(), TreeError> {
        if self.nodes.contains_key(&entity) {
            return Err(TreeError::DuplicateNode(entity));
        }
        let siblings = self.siblings_mut(parent)?;
        let index = index.min(siblings.len());
        siblings.insert(index, entity);
        self.nodes.insert(entity, HierarchyNode::new(entity, parent, expanded));
        Ok(())
    }

    /// Mirror an entity and its world descendants under `parent` at `index`
    pub fn insert_subtree(
        &mut self,
        world: &dyn EntityAuthoring,
        entity: EntityId,
        parent: Option<EntityId>,
        index: usize,
    ) -> Result<(), TreeError> {
        let expanded = world.flags(entity).map(|f| f.expanded).unwrap_or(false);
        self.insert_node(entity, parent, index, expanded)?;
        for child in world.children_of(Some(entity)) {
            self.insert_subtree(world, child, Some(entity), usize::MAX)?;
        }
        Ok(())
    }

    /// Unlink a node (keeping its descendants) and return where it was
    pub fn detach_node(&mut self, entity: EntityId) -> Result<(Option<EntityId>, usize), TreeError> {
        let parent = self
            .nodes
            .get(&entity)
            .ok_or(TreeError::NodeNotFound(entity))?
            .parent;
        let siblings = self.siblings_mut(parent)?;
        let row = siblings
            .iter()
            .position(|c| *c == entity)
            .ok_or(TreeError::NodeNotFound(entity))?;
        siblings.remove(row);
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.parent = None;
        }
        Ok((parent, row))
    }

    /// Link a detached node under `parent` at `index` (clamped)
    pub fn attach_node(
        &mut self,
        entity: EntityId,
        parent: Option<EntityId>,
        index: usize,
    ) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&entity) {
            return Err(TreeError::NodeNotFound(entity));
        }
        let siblings = self.siblings_mut(parent)?;
        let index = index.min(siblings.len());
        siblings.insert(index, entity);
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.parent = parent;
        }
        Ok(())
    }

    /// Remove a node and all of its descendants
    pub fn remove_subtree(&mut self, entity: EntityId) -> Result<RemovedSubtree, TreeError> {
        let ids = self.subtree(entity);
        let (parent, row) = self.detach_node(entity)?;
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(mut node) = self.nodes.remove(&id) {
                if id == entity {
                    node.parent = parent;
                }
                nodes.push(node);
            }
        }
        Ok(RemovedSubtree { parent, row, nodes })
    }

    /// Reinsert a previously removed subtree at its recorded position
    pub fn restore_subtree(&mut self, removed: RemovedSubtree) -> Result<(), TreeError> {
        let Some(root) = removed.nodes.first().map(|n| n.entity) else {
            return Ok(());
        };
        for node in removed.nodes {
            self.nodes.insert(node.entity, node);
        }
        if let Some(node) = self.nodes.get_mut(&root) {
            node.parent = None;
        }
        self.attach_node(root, removed.parent, removed.row)
    }

    /// Record each node's current parent and row before an external move
    pub fn record_pre_move(&mut self, ids: &[EntityId]) {
        for id in ids {
            let slot = self.row_of(*id).map(|row| (self.parent_of(*id), row));
            if let Some(node) = self.nodes.get_mut(id) {
                node.pre_move = slot;
            }
        }
    }

    /// Take the recorded pre-move slot of a node
    pub fn take_pre_move(&mut self, id: EntityId) -> Option<(Option<EntityId>, usize)> {
        self.nodes.get_mut(&id).and_then(|n| n.pre_move.take())
    }

    /// Mirror the selection into the node flags
    pub fn sync_selection(&mut self, selection: &Selection) {
        for node in self.nodes.values_mut() {
            node.selected = selection.contains(&node.entity);
        }
    }
}

/// Entity selection state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Currently selected entities
    pub entities: Vec<EntityId>,
}

impl Selection {
    /// Create a new empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an entity is selected
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains(id)
    }

    /// Add an entity to the selection (idempotent)
    pub fn add(&mut self, id: EntityId) {
        if !self.contains(&id) {
            self.entities.push(id);
        }
    }

    /// Remove an entity from the selection
    pub fn remove(&mut self, id: &EntityId) {
        self.entities.retain(|e| e != id);
    }

    /// Drop every entity the predicate rejects
    pub fn retain(&mut self, mut keep: impl FnMut(&EntityId) -> bool) {
        self.entities.retain(|e| keep(e));
    }

    /// Clear the selection
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Check if the selection is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get the number of selected entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Iterate over selected entities
    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.iter()
    }
}
