// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hierarchy commands for undo/redo support.
//!
//! Each command is built after its mutation has already been applied to the
//! scene. Unless noted otherwise, the first `redo` (issued by
//! `CommandStack::push`) does nothing and later calls replay from stored
//! state. Every replay first checks that the identifiers it needs still
//! resolve; if any is gone the replay is skipped and both layers stay as
//! they are.

mod create;
mod delete;
mod properties;
mod rename;
mod reparent;
mod toggle;
mod value;

pub use create::{CreateCommand, CreateFromTemplateDataCommand, TemplateDataBuilder};
pub use delete::DeleteCommand;
pub use properties::PropertiesChangeCommand;
pub use rename::RenameCommand;
pub use reparent::ReparentCommand;
pub use toggle::{apply_toggle, ToggleCommand, ToggleKind};
pub use value::{IndexChangeCommand, InteractionModeCommand};

use crate::ids::EntityId;
use crate::state::{EditorNotification, EditorState};

fn skip_stale(description: &str, action: &str) {
    tracing::warn!("Skipping {action} of '{description}': referenced entities no longer exist");
}

fn expand_and_select(state: &mut EditorState, parents: &[Option<EntityId>], ids: &[EntityId]) {
    for parent in parents.iter().flatten() {
        if let Some(node) = state.tree.node_mut(*parent) {
            node.expanded = true;
        }
    }
    state.set_selection(ids);
    state.notify(EditorNotification::DisplayRefresh);
}
