// SPDX-License-Identifier: MIT OR Apache-2.0
//! Simple value commands that merge-coalesce.
//!
//! A continuous gesture (dragging through toolbar indices, flicking through
//! interaction modes) pushes one command per step; consecutive commands for
//! the same target on the same stack fold into a single undo step.

use crate::history::HierarchyCommand;
use crate::ids::StackId;
use crate::state::{EditorNotification, EditorState, InteractionMode};
use std::any::Any;

/// Records an interaction mode switch
pub struct InteractionModeCommand {
    stack: StackId,
    from: InteractionMode,
    to: InteractionMode,
    is_first_execution: bool,
}

impl InteractionModeCommand {
    /// Create for the given stack; `to` is the mode now active
    pub fn new(stack: StackId, from: InteractionMode, to: InteractionMode) -> Self {
        Self {
            stack,
            from,
            to,
            is_first_execution: true,
        }
    }

    /// Effective transition
    pub fn transition(&self) -> (InteractionMode, InteractionMode) {
        (self.from, self.to)
    }

    fn set(state: &mut EditorState, mode: InteractionMode) {
        tracing::debug!("Interaction mode -> {}", mode.display_name());
        state.interaction_mode = mode;
        state.notify(EditorNotification::DisplayRefresh);
    }
}

impl HierarchyCommand for InteractionModeCommand {
    fn description(&self) -> &str {
        "Change interaction mode"
    }

    fn undo(&mut self, state: &mut EditorState) {
        Self::set(state, self.from);
    }

    fn redo(&mut self, state: &mut EditorState) {
        if std::mem::take(&mut self.is_first_execution) {
            return;
        }
        Self::set(state, self.to);
    }

    fn merge_with(&mut self, other: &dyn HierarchyCommand) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(other) if other.stack == self.stack => {
                self.to = other.to;
                true
            }
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Records a change of a named index control (e.g. the coordinate system toolbar)
pub struct IndexChangeCommand {
    stack: StackId,
    description: String,
    control: String,
    from: i64,
    to: i64,
    is_first_execution: bool,
}

impl IndexChangeCommand {
    /// Create for the given stack; `to` is the value the control now shows
    pub fn new(stack: StackId, control: impl Into<String>, from: i64, to: i64) -> Self {
        let control = control.into();
        Self {
            stack,
            description: format!("Change {control}"),
            control,
            from,
            to,
            is_first_execution: true,
        }
    }

    /// Effective transition
    pub fn transition(&self) -> (i64, i64) {
        (self.from, self.to)
    }

    fn set(&self, state: &mut EditorState, value: i64) {
        state.control_values.insert(self.control.clone(), value);
        state.notify(EditorNotification::DisplayRefresh);
    }
}

impl HierarchyCommand for IndexChangeCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo(&mut self, state: &mut EditorState) {
        self.set(state, self.from);
    }

    fn redo(&mut self, state: &mut EditorState) {
        if std::mem::take(&mut self.is_first_execution) {
            return;
        }
        self.set(state, self.to);
    }

    fn merge_with(&mut self, other: &dyn HierarchyCommand) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(other) if other.stack == self.stack && other.control == self.control => {
                self.to = other.to;
                true
            }
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
