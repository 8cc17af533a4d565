// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reparent (drag and drop) command.
//!
//! The move has already happened when the command is built. Source slots come
//! from each node's pre-move bookkeeping, destination slots from the live
//! tree. A replay removes every moved node first, then inserts them in
//! ascending row order so that each row is valid against the siblings
//! already placed from the same batch.

use super::skip_stale;
use crate::history::HierarchyCommand;
use crate::ids::EntityId;
use crate::state::EditorState;
use crate::structural::{apply_structural_change, ChildItem, StructuralChange};
use std::any::Any;

/// Moves nodes between source and destination slots
pub struct ReparentCommand {
    description: String,
    source: Vec<ChildItem>,
    destination: Vec<ChildItem>,
    /// Moved nodes and every parent either side refers to
    ids: Vec<EntityId>,
    source_sorted: bool,
    destination_sorted: bool,
    is_first_execution: bool,
}

impl ReparentCommand {
    /// Build from nodes that were just moved with `EditorState::move_entities`
    pub fn new(state: &mut EditorState, moved: &[EntityId]) -> Self {
        let mut source = Vec::with_capacity(moved.len());
        let mut destination = Vec::with_capacity(moved.len());
        for id in moved {
            let Some((parent_id, row)) = state.tree.take_pre_move(*id) else {
                tracing::warn!("No pre-move slot recorded for {id}; leaving it out of the command");
                continue;
            };
            let Some(current_row) = state.tree.row_of(*id) else {
                continue;
            };
            source.push(ChildItem {
                id: *id,
                parent_id,
                row,
            });
            destination.push(ChildItem {
                id: *id,
                parent_id: state.tree.parent_of(*id),
                row: current_row,
            });
        }
        Self::from_items(source, destination)
    }

    /// Build from explicit source and destination slots
    pub fn from_items(source: Vec<ChildItem>, destination: Vec<ChildItem>) -> Self {
        let mut ids: Vec<EntityId> = Vec::new();
        for item in source.iter().chain(destination.iter()) {
            for id in std::iter::once(item.id).chain(item.parent_id) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Self {
            description: format!("Move {} element(s)", destination.len()),
            source,
            destination,
            ids,
            source_sorted: false,
            destination_sorted: false,
            is_first_execution: true,
        }
    }

    /// Source slots
    pub fn source(&self) -> &[ChildItem] {
        &self.source
    }

    /// Destination slots
    pub fn destination(&self) -> &[ChildItem] {
        &self.destination
    }
}

fn reparent(state: &mut EditorState, ids: &[EntityId], target: &mut [ChildItem], sorted: &mut bool) -> bool {
    if !state.all_exist(ids) {
        return false;
    }
    if !*sorted {
        target.sort_by_key(|item| item.row);
        *sorted = true;
    }
    if let Err(err) = apply_structural_change(&mut state.tree, &mut state.world, StructuralChange::Move(target.to_vec())) {
        tracing::warn!("Reparent failed, layers left unchanged: {err}");
        return true;
    }
    let moved: Vec<EntityId> = target.iter().map(|item| item.id).collect();
    state.set_selection(&moved);
    true
}

impl HierarchyCommand for ReparentCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo(&mut self, state: &mut EditorState) {
        if !reparent(state, &self.ids, &mut self.source, &mut self.source_sorted) {
            skip_stale(&self.description, "undo");
        }
    }

    fn redo(&mut self, state: &mut EditorState) {
        if std::mem::take(&mut self.is_first_execution) {
            return;
        }
        if !reparent(state, &self.ids, &mut self.destination, &mut self.destination_sorted) {
            skip_stale(&self.description, "redo");
        }
    }

    fn is_obsolete(&self) -> bool {
        self.destination.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
