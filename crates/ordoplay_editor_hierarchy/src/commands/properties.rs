// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property edit command over the selected subtrees.

use crate::entries::{unserialize_in_place, EntrySide, SerializedEntry};
use crate::history::HierarchyCommand;
use crate::state::{EditorNotification, EditorState};
use std::any::Any;

/// Records a property edit as before/after snapshots of the edited subtrees
///
/// Once a replay finds an entity missing, the command disables itself for
/// good instead of failing again on every undo/redo.
pub struct PropertiesChangeCommand {
    description: String,
    entries: Vec<SerializedEntry>,
    is_first_execution: bool,
    has_previously_failed: bool,
}

impl PropertiesChangeCommand {
    /// Create from entries holding both the undo and the redo side
    pub fn new(description: impl Into<String>, entries: Vec<SerializedEntry>) -> Self {
        Self {
            description: description.into(),
            entries,
            is_first_execution: true,
            has_previously_failed: false,
        }
    }

    /// Check whether a failed replay disabled the command
    pub fn has_previously_failed(&self) -> bool {
        self.has_previously_failed
    }

    fn apply(&mut self, state: &mut EditorState, side: EntrySide) {
        if self.has_previously_failed {
            return;
        }
        match unserialize_in_place(state, &self.entries, side) {
            Ok(touched) => state.notify(EditorNotification::PropertiesChanged(touched)),
            Err(err) => {
                tracing::warn!("Disabling '{}': {err}", self.description);
                self.has_previously_failed = true;
            }
        }
    }
}

impl HierarchyCommand for PropertiesChangeCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo(&mut self, state: &mut EditorState) {
        self.apply(state, EntrySide::Undo);
    }

    fn redo(&mut self, state: &mut EditorState) {
        if std::mem::take(&mut self.is_first_execution) {
            return;
        }
        self.apply(state, EntrySide::Redo);
    }

    fn is_obsolete(&self) -> bool {
        self.entries.iter().all(|e| e.undo_blob == e.redo_blob)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
