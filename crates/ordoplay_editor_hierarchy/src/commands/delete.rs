// SPDX-License-Identifier: MIT OR Apache-2.0
//! Delete command.

use super::skip_stale;
use crate::entries::{
    capture_entries, delete_entries, entries_exist, entries_restorable, restore_entries, EntrySide,
    SerializedEntry,
};
use crate::history::HierarchyCommand;
use crate::ids::EntityId;
use crate::state::EditorState;
use std::any::Any;

/// Deletes nodes; unlike the other commands every `redo` performs the delete
pub struct DeleteCommand {
    description: String,
    entries: Vec<SerializedEntry>,
}

impl DeleteCommand {
    /// Capture the nodes about to be deleted
    pub fn new(state: &EditorState, ids: &[EntityId]) -> Self {
        let entries = capture_entries(state, ids, EntrySide::Undo);
        Self {
            description: format!("Delete {} element(s)", entries.len()),
            entries,
        }
    }

    /// Captured entries
    pub fn entries(&self) -> &[SerializedEntry] {
        &self.entries
    }
}

impl HierarchyCommand for DeleteCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo(&mut self, state: &mut EditorState) {
        if !entries_restorable(state, &self.entries) {
            skip_stale(&self.description, "undo");
            return;
        }
        match restore_entries(state, &self.entries, EntrySide::Undo) {
            Ok((restored, _ticket)) => state.set_selection(&restored),
            Err(err) => tracing::warn!("Undo of '{}' failed: {err}", self.description),
        }
    }

    fn redo(&mut self, state: &mut EditorState) {
        if !entries_exist(state, &self.entries) {
            skip_stale(&self.description, "redo");
            return;
        }
        if let Err(err) = delete_entries(state, &self.entries) {
            tracing::warn!("Delete '{}' failed: {err}", self.description);
        }
    }

    fn is_obsolete(&self) -> bool {
        self.entries.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::CommandStack;
    use crate::test_support::{assert_layers_agree, child_names, place_template, resident_template, scene};
    use crate::template::TemplateInstanceService;
    use crate::world::EntityAuthoring;

    #[test]
    fn test_delete_and_restore_in_place() {
        let (mut state, ids) = scene(&[("A", None), ("B", None), ("B1", Some(1)), ("C", None)]);
        let mut stack = CommandStack::new();
        let command = DeleteCommand::new(&state, &[ids[1]]);
        stack.push(&mut state, Box::new(command));
        assert_eq!(child_names(&state, None), vec!["A", "C"]);
        assert!(!state.world.contains(ids[2]));

        stack.undo(&mut state).unwrap();
        assert_eq!(child_names(&state, None), vec!["A", "B", "C"]);
        assert_eq!(child_names(&state, Some(ids[1])), vec!["B1"]);
        assert_eq!(state.selection.entities, vec![ids[1]]);
        assert_layers_agree(&state);

        stack.redo(&mut state).unwrap();
        assert_eq!(child_names(&state, None), vec!["A", "C"]);
    }

    #[test]
    fn test_out_of_band_delete_is_harmless() {
        let (mut state, ids) = scene(&[("A", None), ("B", None)]);
        let mut stack = CommandStack::new();
        let command = DeleteCommand::new(&state, &[ids[0]]);
        stack.push(&mut state, Box::new(command));
        stack.undo(&mut state).unwrap();

        // Removed by something the stack does not know about.
        state.destroy_entities(&[ids[0]]).unwrap();
        stack.redo(&mut state).unwrap();
        stack.undo(&mut state).unwrap();
        assert_eq!(child_names(&state, None), vec!["A", "B"]);
        assert_layers_agree(&state);
    }

    #[test]
    fn test_entries_hold_template_assets() {
        let (mut state, _) = scene(&[]);
        let asset = resident_template(&mut state, "Slider", &["Track", "Handle"]);
        let root = place_template(&mut state, asset);
        let instance = state.templates.restore_info(root).unwrap().instance;
        let mut stack = CommandStack::new();

        let command = DeleteCommand::new(&state, &[root]);
        stack.push(&mut state, Box::new(command));
        assert_eq!(state.assets.ref_count(asset), 1);
        assert!(state.assets.release_unreferenced().is_empty());

        stack.undo(&mut state).unwrap();
        assert_eq!(state.templates.instance_members(instance).len(), 3);
        assert_eq!(child_names(&state, Some(root)), vec!["Track", "Handle"]);

        stack.clear();
        assert_eq!(state.assets.ref_count(asset), 0);
    }
}
