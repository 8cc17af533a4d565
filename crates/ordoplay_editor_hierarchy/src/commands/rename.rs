// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rename command.

use super::skip_stale;
use crate::history::HierarchyCommand;
use crate::ids::EntityId;
use crate::state::{EditorNotification, EditorState};
use crate::world::EntityAuthoring;
use std::any::Any;

/// Records a rename that was already applied
pub struct RenameCommand {
    description: String,
    id: EntityId,
    from: String,
    to: String,
    is_first_execution: bool,
}

impl RenameCommand {
    /// Create a rename command
    pub fn new(id: EntityId, from: impl Into<String>, to: impl Into<String>) -> Self {
        let (from, to) = (from.into(), to.into());
        Self {
            description: format!("Rename {from} to {to}"),
            id,
            from,
            to,
            is_first_execution: true,
        }
    }

    fn set_name(&self, state: &mut EditorState, name: &str, action: &str) {
        if !state.all_exist(&[self.id]) {
            skip_stale(&self.description, action);
            return;
        }
        if let Err(err) = state.world.set_name(self.id, name) {
            tracing::warn!("'{}' failed: {err}", self.description);
            return;
        }
        state.notify(EditorNotification::DisplayRefresh);
    }
}

impl HierarchyCommand for RenameCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo(&mut self, state: &mut EditorState) {
        self.set_name(state, &self.from, "undo");
    }

    fn redo(&mut self, state: &mut EditorState) {
        if std::mem::take(&mut self.is_first_execution) {
            return;
        }
        self.set_name(state, &self.to, "redo");
    }

    fn is_obsolete(&self) -> bool {
        self.from == self.to
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
