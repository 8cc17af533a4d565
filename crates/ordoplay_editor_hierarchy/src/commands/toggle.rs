// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visible / selectable / expanded toggles.
//!
//! Toggles never merge: a merged pair that flips a flag and back would sit
//! on the stack as an inert step.

use super::skip_stale;
use crate::history::HierarchyCommand;
use crate::ids::EntityId;
use crate::state::{EditorNotification, EditorState};
use crate::world::{EditorFlags, EntityAuthoring};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Which editor flag a toggle changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToggleKind {
    /// Shown in the viewport
    Visible,
    /// Pickable in the viewport
    Selectable,
    /// Expanded in the tree view
    Expanded,
}

impl ToggleKind {
    /// Read the flag
    pub fn get(&self, flags: &EditorFlags) -> bool {
        match self {
            ToggleKind::Visible => flags.visible,
            ToggleKind::Selectable => flags.selectable,
            ToggleKind::Expanded => flags.expanded,
        }
    }

    /// Write the flag
    pub fn set(&self, flags: &mut EditorFlags, value: bool) {
        match self {
            ToggleKind::Visible => flags.visible = value,
            ToggleKind::Selectable => flags.selectable = value,
            ToggleKind::Expanded => flags.expanded = value,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ToggleKind::Visible => "visibility",
            ToggleKind::Selectable => "selectability",
            ToggleKind::Expanded => "expansion",
        }
    }
}

/// Set a flag on every entity, mirroring `Expanded` into the projection
pub fn apply_toggle(state: &mut EditorState, kind: ToggleKind, ids: &[EntityId], value: bool) {
    for id in ids {
        let Some(mut flags) = state.world.flags(*id) else {
            continue;
        };
        kind.set(&mut flags, value);
        if let Err(err) = state.world.set_flags(*id, flags) {
            tracing::warn!("Failed to set {} of {id}: {err}", kind.label());
            continue;
        }
        if kind == ToggleKind::Expanded {
            if let Some(node) = state.tree.node_mut(*id) {
                node.expanded = value;
            }
        }
    }
    state.notify(EditorNotification::DisplayRefresh);
}

/// Records a flag change that was already applied
pub struct ToggleCommand {
    description: String,
    kind: ToggleKind,
    ids: Vec<EntityId>,
    to: bool,
    is_first_execution: bool,
}

impl ToggleCommand {
    /// Create a toggle command; `to` is the value the entities now have
    pub fn new(kind: ToggleKind, ids: Vec<EntityId>, to: bool) -> Self {
        Self {
            description: format!("Toggle {}", kind.label()),
            kind,
            ids,
            to,
            is_first_execution: true,
        }
    }
}

impl HierarchyCommand for ToggleCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo(&mut self, state: &mut EditorState) {
        if !state.all_exist(&self.ids) {
            skip_stale(&self.description, "undo");
            return;
        }
        apply_toggle(state, self.kind, &self.ids, !self.to);
    }

    fn redo(&mut self, state: &mut EditorState) {
        if std::mem::take(&mut self.is_first_execution) {
            return;
        }
        if !state.all_exist(&self.ids) {
            skip_stale(&self.description, "redo");
            return;
        }
        apply_toggle(state, self.kind, &self.ids, self.to);
    }

    fn is_obsolete(&self) -> bool {
        self.ids.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::CommandStack;
    use crate::test_support::scene;

    fn flag(state: &EditorState, kind: ToggleKind, id: EntityId) -> bool {
        kind.get(&state.world.flags(id).unwrap())
    }

    #[test]
    fn test_toggle_visible() {
        let (mut state, ids) = scene(&[("A", None), ("B", None)]);
        let mut stack = CommandStack::new();
        apply_toggle(&mut state, ToggleKind::Visible, &ids, false);
        stack.push(&mut state, Box::new(ToggleCommand::new(ToggleKind::Visible, ids.clone(), false)));
        assert!(!flag(&state, ToggleKind::Visible, ids[0]));

        stack.undo(&mut state).unwrap();
        assert!(ids.iter().all(|id| flag(&state, ToggleKind::Visible, *id)));
        stack.redo(&mut state).unwrap();
        assert!(ids.iter().all(|id| !flag(&state, ToggleKind::Visible, *id)));
    }

    #[test]
    fn test_toggle_expanded_mirrors_projection() {
        let (mut state, ids) = scene(&[("A", None), ("A1", Some(0))]);
        let mut stack = CommandStack::new();
        apply_toggle(&mut state, ToggleKind::Expanded, &ids[..1], true);
        stack.push(&mut state, Box::new(ToggleCommand::new(ToggleKind::Expanded, vec![ids[0]], true)));
        assert!(state.tree.node(ids[0]).unwrap().expanded);

        stack.undo(&mut state).unwrap();
        assert!(!state.tree.node(ids[0]).unwrap().expanded);
        assert!(!flag(&state, ToggleKind::Expanded, ids[0]));
    }

    #[test]
    fn test_toggles_do_not_merge() {
        let (mut state, ids) = scene(&[("A", None)]);
        let mut stack = CommandStack::new();
        stack.push(&mut state, Box::new(ToggleCommand::new(ToggleKind::Selectable, ids.clone(), false)));
        stack.push(&mut state, Box::new(ToggleCommand::new(ToggleKind::Selectable, ids.clone(), true)));
        assert_eq!(stack.undo_depth(), 2);
    }
}
