// SPDX-License-Identifier: MIT OR Apache-2.0
//! Creation commands.

use super::{expand_and_select, skip_stale};
use crate::entries::{
    capture_entries, delete_entries, entries_exist, entries_restorable, restore_entries, EntrySide,
    SerializedEntry,
};
use crate::history::HierarchyCommand;
use crate::ids::EntityId;
use crate::state::{EditorResult, EditorState};
use std::any::Any;

/// Creates entities for a [`CreateFromTemplateDataCommand`] and returns the top-level ones
pub type TemplateDataBuilder = Box<dyn FnMut(&mut EditorState) -> EditorResult<Vec<EntityId>> + Send + Sync>;

/// Records nodes that were just created
///
/// The entries are captured on the first `redo`, from the freshly created
/// subtrees.
pub struct CreateCommand {
    description: String,
    ids: Vec<EntityId>,
    entries: Vec<SerializedEntry>,
    is_first_execution: bool,
}

impl CreateCommand {
    /// Create a command for already created nodes
    pub fn new(ids: Vec<EntityId>) -> Self {
        Self {
            description: format!("Create {} element(s)", ids.len()),
            ids,
            entries: Vec::new(),
            is_first_execution: true,
        }
    }

    /// Captured entries
    pub fn entries(&self) -> &[SerializedEntry] {
        &self.entries
    }
}

impl HierarchyCommand for CreateCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo(&mut self, state: &mut EditorState) {
        if !entries_exist(state, &self.entries) {
            skip_stale(&self.description, "undo");
            return;
        }
        if let Err(err) = delete_entries(state, &self.entries) {
            tracing::warn!("Undo of '{}' failed: {err}", self.description);
        }
    }

    fn redo(&mut self, state: &mut EditorState) {
        if self.is_first_execution {
            self.is_first_execution = false;
            self.entries = capture_entries(state, &self.ids, EntrySide::Redo);
            return;
        }
        if !entries_restorable(state, &self.entries) {
            skip_stale(&self.description, "redo");
            return;
        }
        match restore_entries(state, &self.entries, EntrySide::Redo) {
            Ok((restored, _ticket)) => state.set_selection(&restored),
            Err(err) => tracing::warn!("Redo of '{}' failed: {err}", self.description),
        }
    }

    fn is_obsolete(&self) -> bool {
        !self.is_first_execution && self.entries.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Creates nodes through a builder (empty element, template instance, paste)
///
/// The builder runs on the first `redo`; later calls restore the captured
/// entries. Both re-expand the parents and re-select the result.
pub struct CreateFromTemplateDataCommand {
    description: String,
    builder: Option<TemplateDataBuilder>,
    entries: Vec<SerializedEntry>,
    is_first_execution: bool,
}

impl CreateFromTemplateDataCommand {
    /// Create a command around a builder
    pub fn new(description: impl Into<String>, builder: TemplateDataBuilder) -> Self {
        Self {
            description: description.into(),
            builder: Some(builder),
            entries: Vec::new(),
            is_first_execution: true,
        }
    }

    /// Captured entries
    pub fn entries(&self) -> &[SerializedEntry] {
        &self.entries
    }

    fn parents(&self) -> Vec<Option<EntityId>> {
        self.entries.iter().map(|e| e.parent_id).collect()
    }
}

impl HierarchyCommand for CreateFromTemplateDataCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo(&mut self, state: &mut EditorState) {
        if !entries_exist(state, &self.entries) {
            skip_stale(&self.description, "undo");
            return;
        }
        if let Err(err) = delete_entries(state, &self.entries) {
            tracing::warn!("Undo of '{}' failed: {err}", self.description);
        }
    }

    fn redo(&mut self, state: &mut EditorState) {
        if self.is_first_execution {
            self.is_first_execution = false;
            let Some(mut builder) = self.builder.take() else {
                return;
            };
            match builder(state) {
                Ok(created) => {
                    self.entries = capture_entries(state, &created, EntrySide::Redo);
                    expand_and_select(state, &self.parents(), &created);
                }
                Err(err) => tracing::warn!("'{}' created nothing: {err}", self.description),
            }
            return;
        }
        if !entries_restorable(state, &self.entries) {
            skip_stale(&self.description, "redo");
            return;
        }
        match restore_entries(state, &self.entries, EntrySide::Redo) {
            Ok((restored, _ticket)) => expand_and_select(state, &self.parents(), &restored),
            Err(err) => tracing::warn!("Redo of '{}' failed: {err}", self.description),
        }
    }

    fn is_obsolete(&self) -> bool {
        !self.is_first_execution && self.entries.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{CommandStack, PushOutcome};
    use crate::test_support::{assert_layers_agree, child_names, scene};
    use crate::world::EntityAuthoring;

    #[test]
    fn test_first_redo_does_not_duplicate() {
        let (mut state, ids) = scene(&[("Root", None)]);
        let mut stack = CommandStack::new();
        let child = state.create_entity("Child", Some(ids[0]), None).unwrap();

        let outcome = stack.push(&mut state, Box::new(CreateCommand::new(vec![child])));
        assert_eq!(outcome, PushOutcome::Pushed);
        assert_eq!(child_names(&state, Some(ids[0])), vec!["Child"]);

        stack.undo(&mut state).unwrap();
        assert!(child_names(&state, Some(ids[0])).is_empty());
        assert!(!state.world.contains(child));

        stack.redo(&mut state).unwrap();
        assert_eq!(child_names(&state, Some(ids[0])), vec!["Child"]);
        assert!(state.world.contains(child));
        assert_eq!(state.selection.entities, vec![child]);
        assert_layers_agree(&state);
    }

    #[test]
    fn test_redo_undo_redo_matches_single_redo() {
        let (mut state, _) = scene(&[("A", None), ("B", None)]);
        let mut stack = CommandStack::new();
        let middle = state.create_entity("Middle", None, None).unwrap();
        stack.push(&mut state, Box::new(CreateCommand::new(vec![middle])));
        let expected = child_names(&state, None);

        stack.undo(&mut state).unwrap();
        stack.redo(&mut state).unwrap();
        stack.undo(&mut state).unwrap();
        stack.redo(&mut state).unwrap();
        assert_eq!(child_names(&state, None), expected);
        assert_layers_agree(&state);
    }

    #[test]
    fn test_create_of_missing_ids_is_discarded() {
        let (mut state, _) = scene(&[]);
        let mut stack = CommandStack::new();
        let outcome = stack.push(&mut state, Box::new(CreateCommand::new(vec![EntityId::new()])));
        assert_eq!(outcome, PushOutcome::Discarded);
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_builder_runs_once() {
        let (mut state, ids) = scene(&[("Parent", None)]);
        let parent = ids[0];
        let mut stack = CommandStack::new();
        let builder: TemplateDataBuilder = Box::new(move |state: &mut EditorState| -> EditorResult<Vec<EntityId>> {
            Ok(vec![state.create_entity("Built", Some(parent), None)?])
        });
        stack.push(
            &mut state,
            Box::new(CreateFromTemplateDataCommand::new("Create element", builder)),
        );
        assert_eq!(child_names(&state, Some(parent)), vec!["Built"]);
        assert!(state.tree.node(parent).unwrap().expanded);

        stack.undo(&mut state).unwrap();
        assert!(child_names(&state, Some(parent)).is_empty());
        state.tree.node_mut(parent).unwrap().expanded = false;

        stack.redo(&mut state).unwrap();
        assert_eq!(child_names(&state, Some(parent)), vec!["Built"]);
        assert!(state.tree.node(parent).unwrap().expanded);
        assert_eq!(state.selection.len(), 1);
    }

    #[test]
    fn test_stale_parent_skips_redo() {
        let (mut state, ids) = scene(&[("Parent", None)]);
        let mut stack = CommandStack::new();
        let child = state.create_entity("Child", Some(ids[0]), None).unwrap();
        stack.push(&mut state, Box::new(CreateCommand::new(vec![child])));
        stack.undo(&mut state).unwrap();

        state.destroy_entities(&[ids[0]]).unwrap();
        stack.redo(&mut state).unwrap();
        assert!(state.world.is_empty());
        assert!(state.tree.is_empty());
    }
}
