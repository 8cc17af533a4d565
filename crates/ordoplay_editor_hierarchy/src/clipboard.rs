// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clipboard bridge.
//!
//! Turns editor actions into commands: capture the before state, let the
//! action mutate the scene, capture the after state, push. All factories
//! drop their request while a command replays, so replay side effects never
//! grow the undo trail.

use crate::commands::{CreateFromTemplateDataCommand, DeleteCommand, PropertiesChangeCommand};
use crate::entries::{capture_entries, recapture_entries, EntrySide, SerializedEntry};
use crate::history::{CommandStack, PushOutcome};
use crate::ids::{AssetId, EntityId};
use crate::snapshot::{SnapshotBlob, SnapshotCodec, SnapshotError};
use crate::state::{EditorResult, EditorState, INCOMPATIBLE_FORMAT_MESSAGE};
use crate::structural::{apply_structural_change, AttachItem, StructuralChange};

struct PendingChange {
    description: String,
    entries: Vec<SerializedEntry>,
}

/// Builds undoable commands around editor actions
#[derive(Default)]
pub struct ClipboardBridge {
    pending: Option<PendingChange>,
}

impl ClipboardBridge {
    /// Create a bridge with no change in progress
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a begin/end pair is open
    pub fn has_pending_change(&self) -> bool {
        self.pending.is_some()
    }

    /// Capture the selected subtrees before a property edit
    pub fn begin_undoable_change(&mut self, state: &EditorState, description: impl Into<String>) {
        if state.replay.is_replaying() {
            return;
        }
        let entries = capture_entries(state, &state.selection.entities, EntrySide::Undo);
        self.pending = Some(PendingChange {
            description: description.into(),
            entries,
        });
    }

    /// Capture the after state and push a `PropertiesChangeCommand`
    ///
    /// Returns `None` when no change was open.
    pub fn end_undoable_change(&mut self, state: &mut EditorState, stack: &mut CommandStack) -> Option<PushOutcome> {
        let mut pending = self.pending.take()?;
        if state.replay.is_replaying() {
            return Some(PushOutcome::Suppressed);
        }
        recapture_entries(state, &mut pending.entries, EntrySide::Redo);
        let command = PropertiesChangeCommand::new(pending.description, pending.entries);
        Some(stack.push(state, Box::new(command)))
    }

    /// Copy the selected subtrees to the clipboard as text
    ///
    /// Template linkage of partly selected instances is dropped. Returns
    /// `false` if nothing was copied.
    pub fn copy(&self, state: &mut EditorState) -> bool {
        let top = state.top_level_selection();
        if top.is_empty() {
            return false;
        }
        let capture = state
            .config
            .clipboard_codec()
            .capture(&state.world, &state.templates, &state.assets, &top, true);
        match capture.blob.as_text() {
            Some(text) if !capture.blob.is_empty() => {
                state.clipboard = Some(text.to_string());
                tracing::info!("Copied {} element(s)", top.len());
                true
            }
            _ => false,
        }
    }

    /// Copy, then delete the selection
    pub fn cut(&self, state: &mut EditorState, stack: &mut CommandStack) -> Option<PushOutcome> {
        if state.replay.is_replaying() || !self.copy(state) {
            return None;
        }
        self.delete_selected(state, stack)
    }

    /// Delete the selected subtrees
    pub fn delete_selected(&self, state: &mut EditorState, stack: &mut CommandStack) -> Option<PushOutcome> {
        if state.replay.is_replaying() || state.selection.is_empty() {
            return None;
        }
        let command = DeleteCommand::new(state, &state.selection.entities);
        Some(stack.push(state, Box::new(command)))
    }

    /// Paste the clipboard under `parent`, before `insert_before`, with fresh ids
    pub fn paste(
        &self,
        state: &mut EditorState,
        stack: &mut CommandStack,
        parent: Option<EntityId>,
        insert_before: Option<EntityId>,
    ) -> Option<PushOutcome> {
        if state.replay.is_replaying() {
            return None;
        }
        let blob = SnapshotBlob::from_text(state.clipboard.clone()?);
        if let Err(err) = SnapshotCodec::decode(&blob) {
            match err {
                SnapshotError::SchemaMismatch { .. } => state.report_error(INCOMPATIBLE_FORMAT_MESSAGE),
                other => state.report_error(format!("Failed to paste: {other}")),
            }
            return None;
        }
        Some(self.push_restore(state, stack, "Paste", blob, parent, insert_before))
    }

    /// Duplicate the selection right after its last top-level element
    pub fn duplicate(&self, state: &mut EditorState, stack: &mut CommandStack) -> Option<PushOutcome> {
        if state.replay.is_replaying() {
            return None;
        }
        let top = state.top_level_selection();
        let last = *top.last()?;
        let capture = state
            .config
            .clipboard_codec()
            .capture(&state.world, &state.templates, &state.assets, &top, true);
        if capture.blob.is_empty() {
            return None;
        }
        let parent = state.tree.parent_of(last);
        let insert_before = state.tree.next_sibling(last);
        Some(self.push_restore(state, stack, "Duplicate", capture.blob, parent, insert_before))
    }

    fn push_restore(
        &self,
        state: &mut EditorState,
        stack: &mut CommandStack,
        description: &str,
        blob: SnapshotBlob,
        parent: Option<EntityId>,
        insert_before: Option<EntityId>,
    ) -> PushOutcome {
        let builder = Box::new(move |state: &mut EditorState| -> EditorResult<Vec<EntityId>> {
            let (created, ticket) = state.restore_snapshot(&blob, parent, insert_before, true)?;
            // Capture needs the template linkage in place.
            if let Err(err) = state.wait_for_restore(&ticket) {
                let live: Vec<EntityId> = created.into_iter().filter(|id| state.tree.contains(*id)).collect();
                if let Err(destroy_err) = state.destroy_entities(&live) {
                    tracing::error!("Failed to remove half-restored entities: {destroy_err}");
                }
                state.report_error(format!("Failed to restore template instances: {err}"));
                return Err(err.into());
            }
            Ok(created
                .into_iter()
                .filter(|id| state.tree.contains(*id))
                .collect())
        });
        stack.push(state, Box::new(CreateFromTemplateDataCommand::new(description, builder)))
    }

    /// Create an empty element
    pub fn create_element(
        &self,
        state: &mut EditorState,
        stack: &mut CommandStack,
        name: &str,
        parent: Option<EntityId>,
        insert_before: Option<EntityId>,
    ) -> Option<PushOutcome> {
        if state.replay.is_replaying() {
            return None;
        }
        let name = name.to_string();
        let builder = Box::new(move |state: &mut EditorState| -> EditorResult<Vec<EntityId>> {
            Ok(vec![state.create_entity(&name, parent, insert_before)?])
        });
        Some(stack.push(state, Box::new(CreateFromTemplateDataCommand::new("Create element", builder))))
    }

    /// Instantiate a template asset, loading it first if needed
    pub fn instantiate_template(
        &self,
        state: &mut EditorState,
        stack: &mut CommandStack,
        asset: AssetId,
        parent: Option<EntityId>,
        insert_before: Option<EntityId>,
    ) -> Option<PushOutcome> {
        if state.replay.is_replaying() {
            return None;
        }
        let builder = Box::new(move |state: &mut EditorState| -> EditorResult<Vec<EntityId>> {
            state.wait_for_asset(asset)?;
            let roots = state.templates.instantiate(&mut state.world, asset)?;
            let items = roots
                .iter()
                .map(|entity| AttachItem {
                    entity: *entity,
                    parent,
                    insert_before,
                })
                .collect();
            apply_structural_change(&mut state.tree, &mut state.world, StructuralChange::Attach(items))?;
            Ok(roots)
        });
        Some(stack.push(
            state,
            Box::new(CreateFromTemplateDataCommand::new("Instantiate template", builder)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SnapshotDocument, SNAPSHOT_VERSION};
    use crate::state::EditorNotification;
    use crate::template::{TemplateDefinition, TemplateInstanceService};
    use crate::test_support::{assert_layers_agree, child_names, place_template, resident_template, scene};
    use crate::world::{EntityAuthoring, PropertyValue};

    #[test]
    fn test_begin_end_records_property_edit() {
        let (mut state, ids) = scene(&[("Text", None)]);
        let mut stack = CommandStack::new();
        let mut bridge = ClipboardBridge::new();
        state.set_selection(&ids);

        bridge.begin_undoable_change(&state, "Edit font size");
        state.world.set_property(ids[0], "size", PropertyValue::Float(14.0)).unwrap();
        assert_eq!(bridge.end_undoable_change(&mut state, &mut stack), Some(PushOutcome::Pushed));
        assert_eq!(stack.undo_description(), Some("Edit font size"));

        stack.undo(&mut state).unwrap();
        assert!(state.world.properties(ids[0]).unwrap().is_empty());
        assert_eq!(bridge.end_undoable_change(&mut state, &mut stack), None);
    }

    #[test]
    fn test_end_during_replay_is_dropped() {
        let (mut state, ids) = scene(&[("Text", None)]);
        let mut stack = CommandStack::new();
        let mut bridge = ClipboardBridge::new();
        state.set_selection(&ids);
        bridge.begin_undoable_change(&state, "Edit");

        let _scope = state.replay.enter();
        assert_eq!(
            bridge.end_undoable_change(&mut state, &mut stack),
            Some(PushOutcome::Suppressed)
        );
        assert!(!bridge.has_pending_change());
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_cut_then_paste_twice() {
        let (mut state, ids) = scene(&[("Row", None), ("Cell", Some(0)), ("Footer", None)]);
        let mut stack = CommandStack::new();
        let bridge = ClipboardBridge::new();
        state.set_selection(&[ids[0]]);

        assert_eq!(bridge.cut(&mut state, &mut stack), Some(PushOutcome::Pushed));
        assert_eq!(child_names(&state, None), vec!["Footer"]);

        bridge.paste(&mut state, &mut stack, None, Some(ids[2]));
        bridge.paste(&mut state, &mut stack, None, None);
        assert_eq!(child_names(&state, None), vec!["Row", "Footer", "Row"]);
        let pasted = state.tree.children_of(None).to_vec();
        assert_ne!(pasted[0], ids[0]);
        assert_ne!(pasted[0], pasted[2]);
        assert_eq!(child_names(&state, Some(pasted[2])), vec!["Cell"]);
        assert_eq!(state.selection.entities, vec![pasted[2]]);

        stack.undo(&mut state).unwrap();
        stack.undo(&mut state).unwrap();
        stack.undo(&mut state).unwrap();
        assert_eq!(child_names(&state, None), vec!["Row", "Footer"]);
        assert_eq!(state.tree.children_of(None)[0], ids[0]);
        assert_layers_agree(&state);
    }

    #[test]
    fn test_paste_of_incompatible_text_reports_error() {
        let (mut state, _) = scene(&[]);
        let mut stack = CommandStack::new();
        let document = SnapshotDocument {
            version: SNAPSHOT_VERSION + 7,
            ..Default::default()
        };
        let blob = SnapshotCodec::text().encode(&document).unwrap();
        state.clipboard = blob.as_text().map(str::to_string);

        assert_eq!(ClipboardBridge::new().paste(&mut state, &mut stack, None, None), None);
        assert!(state.world.is_empty());
        assert!(!stack.can_undo());
        assert_eq!(
            state.take_notifications(),
            vec![EditorNotification::Error(INCOMPATIBLE_FORMAT_MESSAGE.to_string())]
        );
    }

    #[test]
    fn test_duplicate_inserts_after_selection() {
        let (mut state, ids) = scene(&[("A", None), ("B", None), ("C", None)]);
        let mut stack = CommandStack::new();
        let bridge = ClipboardBridge::new();
        state.set_selection(&[ids[0], ids[1]]);

        assert_eq!(bridge.duplicate(&mut state, &mut stack), Some(PushOutcome::Pushed));
        assert_eq!(child_names(&state, None), vec!["A", "B", "A", "B", "C"]);
        assert_eq!(state.clipboard, None);

        stack.undo(&mut state).unwrap();
        stack.redo(&mut state).unwrap();
        assert_eq!(child_names(&state, None), vec!["A", "B", "A", "B", "C"]);
        assert_layers_agree(&state);
    }

    #[test]
    fn test_paste_of_partial_instance_is_untemplated() {
        let (mut state, _) = scene(&[]);
        let asset = resident_template(&mut state, "Toolbar", &["Save", "Load"]);
        let root = place_template(&mut state, asset);
        let save = state.tree.children_of(Some(root))[0];
        let bridge = ClipboardBridge::new();
        let mut stack = CommandStack::new();

        state.set_selection(&[save]);
        assert!(bridge.copy(&mut state));
        bridge.paste(&mut state, &mut stack, None, None);
        let copy = *state.tree.children_of(None).last().unwrap();
        assert_eq!(state.world.name(copy).as_deref(), Some("Save"));
        assert_eq!(state.templates.restore_info(copy), None);
    }

    #[test]
    fn test_paste_reloads_released_template() {
        let (mut state, _) = scene(&[]);
        let asset = resident_template(&mut state, "Card", &["Title"]);
        let root = place_template(&mut state, asset);
        let source_instance = state.templates.instance_of(root).unwrap();
        let bridge = ClipboardBridge::new();
        let mut stack = CommandStack::new();

        state.set_selection(&[root]);
        assert!(bridge.copy(&mut state));
        assert_eq!(state.assets.release_unreferenced(), vec![asset]);

        assert_eq!(bridge.paste(&mut state, &mut stack, None, None), Some(PushOutcome::Pushed));
        assert!(state.assets.is_ready(asset));
        assert!(!state.deferred.has_pending_requests());
        let pasted = state.tree.children_of(None)[1];
        let title = state.tree.children_of(Some(pasted))[0];
        let instance = state.templates.instance_of(pasted).unwrap();
        assert_ne!(instance, source_instance);
        assert_eq!(state.templates.instance_of(title), Some(instance));
        assert_eq!(state.templates.instance_members(instance).len(), 2);
        assert_layers_agree(&state);
    }

    #[test]
    fn test_paste_of_missing_template_leaves_scene_untouched() {
        let (mut state, _) = scene(&[]);
        state.config.restore_poll_interval_ms = 1;
        state.config.restore_timeout_ms = 5;
        let asset = resident_template(&mut state, "Card", &["Title"]);
        let root = place_template(&mut state, asset);
        let bridge = ClipboardBridge::new();
        let mut stack = CommandStack::new();

        state.set_selection(&[root]);
        assert!(bridge.copy(&mut state));
        state.assets.mark_missing(asset);
        state.take_notifications();

        assert_eq!(bridge.paste(&mut state, &mut stack, None, None), Some(PushOutcome::Discarded));
        assert!(!stack.can_undo());
        assert_eq!(state.tree.children_of(None), &[root]);
        assert_eq!(state.world.len(), 2);
        assert!(state
            .take_notifications()
            .iter()
            .any(|n| matches!(n, EditorNotification::Error(_))));
        assert_layers_agree(&state);
    }

    #[test]
    fn test_instantiate_template_waits_for_load() {
        let (mut state, ids) = scene(&[("Canvas", None)]);
        let asset = state
            .templates
            .register_template(TemplateDefinition::new("Dialog"));
        let mut stack = CommandStack::new();
        let bridge = ClipboardBridge::new();

        let outcome = bridge.instantiate_template(&mut state, &mut stack, asset, Some(ids[0]), None);
        assert_eq!(outcome, Some(PushOutcome::Pushed));
        assert!(state.assets.is_ready(asset));
        assert_eq!(child_names(&state, Some(ids[0])), vec!["Dialog"]);
        let dialog = state.tree.children_of(Some(ids[0]))[0];
        assert!(state.templates.restore_info(dialog).is_some());

        stack.undo(&mut state).unwrap();
        assert!(child_names(&state, Some(ids[0])).is_empty());
        stack.redo(&mut state).unwrap();
        assert_eq!(child_names(&state, Some(ids[0])), vec!["Dialog"]);
        assert!(state.templates.restore_info(dialog).is_some());
    }

    #[test]
    fn test_create_element_undo() {
        let (mut state, _) = scene(&[]);
        let mut stack = CommandStack::new();
        let bridge = ClipboardBridge::new();
        bridge.create_element(&mut state, &mut stack, "Image", None, None);
        assert_eq!(child_names(&state, None), vec!["Image"]);
        stack.undo(&mut state).unwrap();
        assert!(state.tree.is_empty());
    }
}
