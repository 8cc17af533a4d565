// SPDX-License-Identifier: MIT OR Apache-2.0
//! Two-layer structural changes.
//!
//! Every change that touches both the projection tree and the live entity
//! graph goes through [`apply_structural_change`]. The projection side is
//! always mutated first; if the runtime side then fails, the projection
//! mutation is rolled back so the two layers never disagree.

use crate::hierarchy::{HierarchyTree, RemovedSubtree, TreeError};
use crate::ids::EntityId;
use crate::world::{EntityAuthoring, WorldError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Structural change errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// An entity named by the change does not exist
    #[error("Entity missing: {0}")]
    MissingEntity(EntityId),

    /// A parent named by the change does not exist
    #[error("Parent missing: {0}")]
    MissingParent(EntityId),

    /// A move would place a node beneath itself
    #[error("Cannot move {0} beneath itself")]
    MoveIntoSelf(EntityId),

    /// A batch names the same entity more than once
    #[error("Entity {0} appears more than once in the batch")]
    DuplicateEntity(EntityId),

    /// Projection tree failure
    #[error("Projection error: {0}")]
    Tree(#[from] TreeError),

    /// Runtime graph failure (projection already rolled back)
    #[error("Runtime error: {0}")]
    Runtime(#[from] WorldError),
}

/// Result type for structural changes
pub type StructuralResult<T> = std::result::Result<T, StructuralError>;

/// A node's logical parent and row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildItem {
    /// Node being placed
    pub id: EntityId,
    /// Parent (`None` = top level)
    pub parent_id: Option<EntityId>,
    /// Row within the parent
    pub row: usize,
}

/// An existing loose entity to insert into the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachItem {
    /// Entity to attach (with its world descendants)
    pub entity: EntityId,
    /// Parent (`None` = top level)
    pub parent: Option<EntityId>,
    /// Sibling to insert before; appends when absent or missing
    pub insert_before: Option<EntityId>,
}

/// A structural mutation of both layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralChange {
    /// Create a new node together with its entity
    Create {
        /// Identifier for the new entity
        entity: EntityId,
        /// Entity name
        name: String,
        /// Parent (`None` = top level)
        parent: Option<EntityId>,
        /// Sibling to insert before
        insert_before: Option<EntityId>,
    },
    /// Insert loose entities into the hierarchy, in order
    Attach(Vec<AttachItem>),
    /// Destroy nodes, their entities and all descendants
    Destroy(Vec<EntityId>),
    /// Move nodes to new parents and rows; applied in the given order
    Move(Vec<ChildItem>),
}

/// Apply a structural change, projection first, runtime second
pub fn apply_structural_change(
    tree: &mut HierarchyTree,
    world: &mut dyn EntityAuthoring,
    change: StructuralChange,
) -> StructuralResult<()> {
    match change {
        StructuralChange::Create {
            entity,
            name,
            parent,
            insert_before,
        } => create(tree, world, entity, &name, parent, insert_before),
        StructuralChange::Attach(items) => attach(tree, world, &items),
        StructuralChange::Destroy(ids) => destroy(tree, world, &ids),
        StructuralChange::Move(items) => move_nodes(tree, world, &items),
    }
}

fn tree_index(tree: &HierarchyTree, parent: Option<EntityId>, before: Option<EntityId>) -> usize {
    before
        .and_then(|b| tree.children_of(parent).iter().position(|c| *c == b))
        .unwrap_or(usize::MAX)
}

fn world_index(world: &dyn EntityAuthoring, parent: Option<EntityId>, before: Option<EntityId>) -> usize {
    before
        .and_then(|b| world.children_of(parent).iter().position(|c| *c == b))
        .unwrap_or(usize::MAX)
}

fn check_parent(
    tree: &HierarchyTree,
    world: &dyn EntityAuthoring,
    parent: Option<EntityId>,
) -> StructuralResult<()> {
    match parent {
        Some(parent) if !tree.contains(parent) || !world.contains(parent) => {
            Err(StructuralError::MissingParent(parent))
        }
        _ => Ok(()),
    }
}

fn create(
    tree: &mut HierarchyTree,
    world: &mut dyn EntityAuthoring,
    entity: EntityId,
    name: &str,
    parent: Option<EntityId>,
    insert_before: Option<EntityId>,
) -> StructuralResult<()> {
    check_parent(tree, world, parent)?;

    let index = tree_index(tree, parent, insert_before);
    tree.insert_node(entity, parent, index, false)?;

    if let Err(err) = world.create_entity(entity, name) {
        let _ = tree.remove_subtree(entity);
        return Err(err.into());
    }
    let index = world_index(world, parent, insert_before);
    if let Err(err) = world.attach(entity, parent, index) {
        let _ = world.destroy_entity(entity);
        let _ = tree.remove_subtree(entity);
        return Err(err.into());
    }
    Ok(())
}

fn attach(
    tree: &mut HierarchyTree,
    world: &mut dyn EntityAuthoring,
    items: &[AttachItem],
) -> StructuralResult<()> {
    for item in items {
        if !world.contains(item.entity) {
            return Err(StructuralError::MissingEntity(item.entity));
        }
    }

    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let index = tree_index(tree, item.parent, item.insert_before);
        let result = match check_parent(tree, world, item.parent) {
            Ok(()) => tree
                .insert_subtree(world, item.entity, item.parent, index)
                .map_err(StructuralError::from),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            for entity in inserted.iter().rev() {
                let _ = tree.remove_subtree(*entity);
            }
            return Err(err);
        }
        inserted.push(item.entity);
    }

    for (done, item) in items.iter().enumerate() {
        let index = world_index(world, item.parent, item.insert_before);
        if let Err(err) = world.attach(item.entity, item.parent, index) {
            tracing::error!("Runtime attach of {} failed, rolling back: {err}", item.entity);
            for earlier in &items[..done] {
                let _ = world.detach(earlier.entity);
            }
            for entity in inserted.iter().rev() {
                let _ = tree.remove_subtree(*entity);
            }
            return Err(err.into());
        }
    }
    Ok(())
}

fn destroy(
    tree: &mut HierarchyTree,
    world: &mut dyn EntityAuthoring,
    ids: &[EntityId],
) -> StructuralResult<()> {
    for id in ids {
        if !tree.contains(*id) && !world.contains(*id) {
            return Err(StructuralError::MissingEntity(*id));
        }
    }

    let mut removed: Vec<RemovedSubtree> = Vec::new();
    for id in ids {
        // Already gone with an ancestor earlier in the batch.
        if tree.contains(*id) {
            removed.push(tree.remove_subtree(*id)?);
        }
    }

    for id in ids {
        if !world.contains(*id) {
            continue;
        }
        if let Err(err) = world.destroy_entity(*id) {
            tracing::error!("Runtime destroy of {id} failed, rolling back projection: {err}");
            for subtree in removed.into_iter().rev() {
                let _ = tree.restore_subtree(subtree);
            }
            return Err(err.into());
        }
    }
    Ok(())
}

/// Parent a node will have once the batch is applied
fn parent_after(tree: &HierarchyTree, items: &[ChildItem], id: EntityId) -> Option<EntityId> {
    items
        .iter()
        .find(|item| item.id == id)
        .map_or_else(|| tree.parent_of(id), |item| item.parent_id)
}

fn validate_move(
    tree: &HierarchyTree,
    world: &dyn EntityAuthoring,
    items: &[ChildItem],
) -> StructuralResult<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            return Err(StructuralError::DuplicateEntity(item.id));
        }
        if !tree.contains(item.id) || !world.contains(item.id) {
            return Err(StructuralError::MissingEntity(item.id));
        }
        check_parent(tree, world, item.parent_id)?;
    }

    // Walk ancestors as they will be after the move, so that two nodes
    // moved beneath each other are caught too.
    for item in items {
        let mut current = item.parent_id;
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == item.id || steps > tree.len() {
                return Err(StructuralError::MoveIntoSelf(item.id));
            }
            current = parent_after(tree, items, parent);
            steps += 1;
        }
    }
    Ok(())
}

/// Undo a partly applied batch on the projection
///
/// `attached` nodes are unlinked again, then every origin is re-linked in
/// reverse detach order so each recorded row is valid when it is used.
fn rollback_tree(tree: &mut HierarchyTree, attached: &[ChildItem], origins: &[ChildItem]) {
    for item in attached {
        let _ = tree.detach_node(item.id);
    }
    for origin in origins.iter().rev() {
        let _ = tree.attach_node(origin.id, origin.parent_id, origin.row);
    }
}

fn rollback_world(world: &mut dyn EntityAuthoring, attached: &[ChildItem], origins: &[ChildItem]) {
    for item in attached {
        let _ = world.detach(item.id);
    }
    for origin in origins.iter().rev() {
        let _ = world.attach(origin.id, origin.parent_id, origin.row);
    }
}

fn move_nodes(
    tree: &mut HierarchyTree,
    world: &mut dyn EntityAuthoring,
    items: &[ChildItem],
) -> StructuralResult<()> {
    validate_move(tree, world, items)?;

    // Projection: every removal completes before any insertion.
    let mut tree_origin = Vec::with_capacity(items.len());
    for item in items {
        match tree.detach_node(item.id) {
            Ok((parent, row)) => tree_origin.push(ChildItem {
                id: item.id,
                parent_id: parent,
                row,
            }),
            Err(err) => {
                rollback_tree(tree, &[], &tree_origin);
                return Err(err.into());
            }
        }
    }
    for (done, item) in items.iter().enumerate() {
        if let Err(err) = tree.attach_node(item.id, item.parent_id, item.row) {
            rollback_tree(tree, &items[..done], &tree_origin);
            return Err(err.into());
        }
    }

    // Runtime mirrors the projection order.
    let mut world_origin = Vec::with_capacity(items.len());
    for item in items {
        let parent = world.parent_of(item.id);
        let row = world
            .children_of(parent)
            .iter()
            .position(|c| *c == item.id)
            .unwrap_or(usize::MAX);
        if let Err(err) = world.detach(item.id) {
            rollback_world(world, &[], &world_origin);
            rollback_tree(tree, items, &tree_origin);
            return Err(err.into());
        }
        world_origin.push(ChildItem {
            id: item.id,
            parent_id: parent,
            row,
        });
    }
    for (done, item) in items.iter().enumerate() {
        if let Err(err) = world.attach(item.id, item.parent_id, item.row) {
            tracing::error!("Runtime move of {} failed, rolling back: {err}", item.id);
            rollback_world(world, &items[..done], &world_origin);
            rollback_tree(tree, items, &tree_origin);
            return Err(err.into());
        }
    }
    Ok(())
}
