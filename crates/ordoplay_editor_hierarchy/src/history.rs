// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command stack with replay guard and merge-coalescing.
//!
//! Commands are pushed after the user action has already mutated the scene,
//! so `push` runs the command's first `redo`, which each command treats as a
//! no-op (or as its capture step). While any command replays, the shared
//! [`ReplayGuard`] is raised and command factories drop their requests.

use crate::config::HierarchyConfig;
use crate::ids::StackId;
use crate::state::EditorState;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Maximum undo history depth
pub const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Undo/redo requested while a command is replaying
    #[error("A command is already replaying")]
    Replaying,
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Scoped "a command is replaying" flag
///
/// Clones share the same counter, so the guard can be handed to every
/// component that creates commands.
#[derive(Debug, Clone, Default)]
pub struct ReplayGuard {
    depth: Arc<AtomicUsize>,
}

impl ReplayGuard {
    /// Create a lowered guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a command is replaying
    pub fn is_replaying(&self) -> bool {
        self.depth.load(Ordering::Acquire) > 0
    }

    /// Raise the guard until the returned scope is dropped
    pub fn enter(&self) -> ReplayScope {
        self.depth.fetch_add(1, Ordering::AcqRel);
        ReplayScope {
            depth: Arc::clone(&self.depth),
        }
    }
}

/// Keeps the replay guard raised while alive
#[derive(Debug)]
pub struct ReplayScope {
    depth: Arc<AtomicUsize>,
}

impl Drop for ReplayScope {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A reversible hierarchy mutation
pub trait HierarchyCommand: Send + Sync {
    /// Human-readable description
    fn description(&self) -> &str;

    /// Revert the mutation
    fn undo(&mut self, state: &mut EditorState);

    /// Apply the mutation; the first call after construction is the push
    fn redo(&mut self, state: &mut EditorState);

    /// Absorb a newer command of the same kind; returns `true` if merged
    fn merge_with(&mut self, _other: &dyn HierarchyCommand) -> bool {
        false
    }

    /// A command with nothing left to do is dropped instead of pushed
    fn is_obsolete(&self) -> bool {
        false
    }

    /// Downcast support for merging
    fn as_any(&self) -> &dyn Any;
}

/// What `push` did with a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Added as a new undo step
    Pushed,
    /// Folded into the previous undo step
    Merged,
    /// Dropped because a command was replaying
    Suppressed,
    /// Dropped because it turned out to have no effect
    Discarded,
}

/// Command stack statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Commands in the undo stack
    pub undo_count: usize,
    /// Commands in the redo stack
    pub redo_count: usize,
    /// Maximum history depth
    pub max_depth: usize,
    /// Whether the stack is at its clean point
    pub clean: bool,
}

/// Undo/redo stack of hierarchy commands
pub struct CommandStack {
    id: StackId,
    undo_stack: VecDeque<Box<dyn HierarchyCommand>>,
    redo_stack: Vec<Box<dyn HierarchyCommand>>,
    max_depth: usize,
    /// Undo depth at the clean point; `None` once that point is unreachable
    clean_depth: Option<usize>,
}

impl CommandStack {
    /// Create a stack with the default depth
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            id: StackId::new(),
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
            clean_depth: Some(0),
        }
    }

    /// Create with the depth from settings
    pub fn from_config(config: &HierarchyConfig) -> Self {
        Self::with_max_depth(config.max_history)
    }

    /// Identifier commands use to check they belong to this stack
    pub fn id(&self) -> StackId {
        self.id
    }

    /// Push a command whose effect has already been applied
    pub fn push(&mut self, state: &mut EditorState, mut command: Box<dyn HierarchyCommand>) -> PushOutcome {
        if state.replay.is_replaying() {
            tracing::debug!("Suppressed '{}' pushed during replay", command.description());
            return PushOutcome::Suppressed;
        }

        {
            let _scope = state.replay.enter();
            command.redo(state);
        }

        if command.is_obsolete() {
            tracing::debug!("Discarded obsolete command '{}'", command.description());
            return PushOutcome::Discarded;
        }

        self.redo_stack.clear();
        if self.clean_depth.is_some_and(|depth| depth > self.undo_stack.len()) {
            self.clean_depth = None;
        }

        if let Some(top) = self.undo_stack.back_mut() {
            if top.merge_with(command.as_ref()) {
                tracing::debug!("Merged '{}' into previous command", command.description());
                if self.clean_depth == Some(self.undo_stack.len()) {
                    self.clean_depth = None;
                }
                return PushOutcome::Merged;
            }
        }

        tracing::debug!("Pushed '{}'", command.description());
        self.undo_stack.push_back(command);

        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
            self.clean_depth = match self.clean_depth {
                Some(0) | None => None,
                Some(depth) => Some(depth - 1),
            };
        }
        PushOutcome::Pushed
    }

    /// Undo the last command
    pub fn undo(&mut self, state: &mut EditorState) -> Result<()> {
        if state.replay.is_replaying() {
            return Err(HistoryError::Replaying);
        }
        let mut command = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;
        tracing::info!("Undo: {}", command.description());
        {
            let _scope = state.replay.enter();
            command.undo(state);
        }
        self.redo_stack.push(command);
        Ok(())
    }

    /// Redo the last undone command
    pub fn redo(&mut self, state: &mut EditorState) -> Result<()> {
        if state.replay.is_replaying() {
            return Err(HistoryError::Replaying);
        }
        let mut command = self.redo_stack.pop().ok_or(HistoryError::NothingToRedo)?;
        tracing::info!("Redo: {}", command.description());
        {
            let _scope = state.replay.enter();
            command.redo(state);
        }
        self.undo_stack.push_back(command);
        Ok(())
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Mark the current position as clean (e.g. after saving)
    pub fn set_clean(&mut self) {
        self.clean_depth = Some(self.undo_stack.len());
    }

    /// Check if the stack is at its clean point
    pub fn is_clean(&self) -> bool {
        self.clean_depth == Some(self.undo_stack.len())
    }

    /// Clear all history; the empty stack is clean
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.clean_depth = Some(0);
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            max_depth: self.max_depth,
            clean: self.is_clean(),
        }
    }

    /// Get description of next undo command
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description())
    }

    /// Get description of next redo command
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.description())
    }

    /// The command on top of the undo stack
    pub fn top(&self) -> Option<&dyn HierarchyCommand> {
        self.undo_stack.back().map(|c| c.as_ref())
    }
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStack")
            .field("id", &self.id)
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .field("max_depth", &self.max_depth)
            .field("clean_depth", &self.clean_depth)
            .finish()
    }
}
