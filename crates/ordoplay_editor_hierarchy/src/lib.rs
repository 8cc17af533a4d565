// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene hierarchy undo/redo for `OrdoPlay` Editor.
//!
//! This crate records every structural and property edit of a UI scene as
//! an undoable command:
//! - Create, delete, reparent and rename of hierarchy nodes
//! - Visibility, selectability and expansion toggles
//! - Property edits captured as before/after snapshots
//! - Merge-coalesced value changes (interaction mode, toolbar indices)
//! - Copy, cut, paste and duplicate through a text clipboard
//!
//! ## Architecture
//!
//! The editor keeps two layers in step:
//! - A projection tree ([`HierarchyTree`]) shown in the outliner
//! - The live entity graph behind [`EntityAuthoring`]
//!
//! Subtrees are persisted with the [`SnapshotCodec`] (binary for the undo
//! trail, RON text for the clipboard). Entities that belong to a template
//! instance are re-linked on restore; if the template asset is not resident
//! yet the re-link is deferred until the asset system reports it ready.

pub mod assets;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod deferred;
pub mod entries;
pub mod hierarchy;
pub mod history;
pub mod ids;
pub mod snapshot;
pub mod state;
pub mod structural;
pub mod template;
pub mod world;

#[cfg(test)]
mod test_support;

pub use assets::{AssetHandle, AssetManager, AssetState};
pub use clipboard::ClipboardBridge;
pub use config::HierarchyConfig;
pub use deferred::{DeferredRestoreQueue, RestoreStatus, RestoreTicket};
pub use hierarchy::{HierarchyTree, Selection};
pub use history::{CommandStack, HierarchyCommand, HistoryError, PushOutcome, ReplayGuard};
pub use ids::{AssetId, EntityId, InstanceId, StackId};
pub use snapshot::{SnapshotBlob, SnapshotCodec, SnapshotDocument, SnapshotEncoding, SnapshotError};
pub use state::{EditorError, EditorNotification, EditorState, InteractionMode};
pub use structural::{apply_structural_change, StructuralChange, StructuralError};
pub use template::{TemplateDefinition, TemplateInstanceService, TemplateRegistry};
pub use world::{EntityAuthoring, PropertyValue, SceneWorld};
