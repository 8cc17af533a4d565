// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor state management.
//!
//! [`EditorState`] is the context carried through every command: the live
//! entity graph, its projection tree, the template and asset services, the
//! deferred restore queue, the selection and the replay guard. Commands and
//! the clipboard bridge reach everything through it, never through globals.

use crate::assets::AssetManager;
use crate::config::HierarchyConfig;
use crate::deferred::{DeferredRestoreQueue, RestoreStatus, RestoreTicket};
use crate::hierarchy::{HierarchyTree, Selection};
use crate::history::ReplayGuard;
use crate::ids::{AssetId, EntityId};
use crate::snapshot::{SnapshotBlob, SnapshotCodec, SnapshotError};
use crate::structural::{
    apply_structural_change, AttachItem, ChildItem, StructuralChange, StructuralError, StructuralResult,
};
use crate::template::{TemplateError, TemplateInstanceService, TemplateRegistry};
use crate::world::{EntityAuthoring, SceneWorld};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

/// Message shown when a snapshot was written by an incompatible schema
pub const INCOMPATIBLE_FORMAT_MESSAGE: &str = "failed to restore/paste - incompatible format";

/// Failure of a synchronous restore wait
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    /// The asset pump did not finish the restore in time
    #[error("Timed out with {outstanding} template restore(s) still pending")]
    TimedOut {
        /// Requests still waiting when the wait gave up
        outstanding: usize,
    },

    /// The restore was cancelled (editor torn down)
    #[error("Template restore was cancelled")]
    Cancelled,
}

/// Errors surfaced by editor-level operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// Snapshot decode/encode failure
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Two-layer mutation failure
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// Template service failure
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Synchronous restore wait failure
    #[error(transparent)]
    Restore(#[from] RestoreError),
}

/// Result type for editor-level operations
pub type EditorResult<T> = std::result::Result<T, EditorError>;

/// Notifications produced for the rest of the editor (property panel, viewport)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorNotification {
    /// The selection changed
    SelectionChanged(Vec<EntityId>),
    /// Entities were created or destroyed
    EntitiesAddedOrRemoved,
    /// Component properties of these entities changed
    PropertiesChanged(Vec<EntityId>),
    /// Names or flags changed; redraw the tree
    DisplayRefresh,
    /// A user-visible failure
    Error(String),
}

/// Viewport interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InteractionMode {
    /// Pick elements
    #[default]
    Selection,
    /// Translate elements
    Move,
    /// Edit anchors
    Anchor,
    /// Rotate elements
    Rotate,
    /// Resize elements
    Resize,
}

impl InteractionMode {
    /// Get display name for this mode
    pub fn display_name(&self) -> &'static str {
        match self {
            InteractionMode::Selection => "Selection",
            InteractionMode::Move => "Move",
            InteractionMode::Anchor => "Anchor",
            InteractionMode::Rotate => "Rotate",
            InteractionMode::Resize => "Resize",
        }
    }
}

/// Main editor state
#[derive(Debug)]
pub struct EditorState {
    /// Live entity graph
    pub world: SceneWorld,
    /// Projection of the live graph
    pub tree: HierarchyTree,
    /// Template definitions and instances
    pub templates: TemplateRegistry,
    /// Template asset residency
    pub assets: AssetManager,
    /// Restores waiting on template assets
    pub deferred: DeferredRestoreQueue,
    /// Current entity selection
    pub selection: Selection,
    /// Raised while a command replays
    pub replay: ReplayGuard,
    /// Clipboard text (a text snapshot)
    pub clipboard: Option<String>,
    /// Current viewport interaction mode
    pub interaction_mode: InteractionMode,
    /// Toolbar index controls by name (e.g. coordinate system)
    pub control_values: IndexMap<String, i64>,
    /// Settings
    pub config: HierarchyConfig,
    notifications: Vec<EditorNotification>,
}

impl EditorState {
    /// Create an empty editor state
    pub fn new(config: HierarchyConfig) -> Self {
        let assets = AssetManager::new();
        Self {
            world: SceneWorld::new(),
            tree: HierarchyTree::new(),
            templates: TemplateRegistry::new(assets.clone()),
            assets,
            deferred: DeferredRestoreQueue::new(),
            selection: Selection::new(),
            replay: ReplayGuard::new(),
            clipboard: None,
            interaction_mode: InteractionMode::default(),
            control_values: IndexMap::new(),
            config,
            notifications: Vec::new(),
        }
    }

    /// Queue a notification
    pub fn notify(&mut self, notification: EditorNotification) {
        self.notifications.push(notification);
    }

    /// Drain queued notifications
    pub fn take_notifications(&mut self) -> Vec<EditorNotification> {
        std::mem::take(&mut self.notifications)
    }

    /// Report a user-visible failure
    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.notify(EditorNotification::Error(message));
    }

    /// Check that every id has a node and a live entity
    pub fn all_exist(&self, ids: &[EntityId]) -> bool {
        ids.iter().all(|id| self.tree.contains(*id) && self.world.contains(*id))
    }

    /// Replace the selection, dropping ids that no longer exist
    pub fn set_selection(&mut self, ids: &[EntityId]) {
        let mut selection = Selection::new();
        for id in ids.iter().filter(|id| self.tree.contains(**id)) {
            selection.add(*id);
        }
        self.selection = selection;
        self.tree.sync_selection(&self.selection);
        self.notify(EditorNotification::SelectionChanged(self.selection.entities.clone()));
    }

    /// Selected ids with descendants of other selected ids removed, in display order
    pub fn top_level_selection(&self) -> Vec<EntityId> {
        top_level_in_order(&self.tree, &self.selection.entities)
    }

    /// Create a named entity and its node
    pub fn create_entity(
        &mut self,
        name: &str,
        parent: Option<EntityId>,
        insert_before: Option<EntityId>,
    ) -> StructuralResult<EntityId> {
        let entity = EntityId::new();
        apply_structural_change(
            &mut self.tree,
            &mut self.world,
            StructuralChange::Create {
                entity,
                name: name.to_string(),
                parent,
                insert_before,
            },
        )?;
        self.notify(EditorNotification::EntitiesAddedOrRemoved);
        Ok(entity)
    }

    /// Destroy entities with their subtrees, unlinking them from template instances
    pub fn destroy_entities(&mut self, ids: &[EntityId]) -> StructuralResult<()> {
        let ids: Vec<EntityId> = ids
            .iter()
            .copied()
            .filter(|id| self.tree.contains(*id) || self.world.contains(*id))
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        let mut doomed = Vec::new();
        for id in &ids {
            doomed.extend(self.tree.subtree(*id));
        }

        apply_structural_change(&mut self.tree, &mut self.world, StructuralChange::Destroy(ids))?;

        for id in &doomed {
            self.templates.remove_entity(*id);
        }
        let before = self.selection.len();
        self.selection.retain(|id| !doomed.contains(id));
        if self.selection.len() != before {
            self.notify(EditorNotification::SelectionChanged(self.selection.entities.clone()));
        }
        self.notify(EditorNotification::EntitiesAddedOrRemoved);
        Ok(())
    }

    /// Move entities the way a drag and drop does, recording their pre-move slots
    ///
    /// Entities are inserted at consecutive rows starting at `row`. Build a
    /// `ReparentCommand` afterwards to make the move undoable.
    pub fn move_entities(
        &mut self,
        ids: &[EntityId],
        parent: Option<EntityId>,
        row: usize,
    ) -> StructuralResult<()> {
        self.tree.record_pre_move(ids);
        let items = ids
            .iter()
            .enumerate()
            .map(|(offset, id)| ChildItem {
                id: *id,
                parent_id: parent,
                row: row.saturating_add(offset),
            })
            .collect();
        apply_structural_change(&mut self.tree, &mut self.world, StructuralChange::Move(items))
    }

    /// Restore a snapshot under `parent`, before `insert_before`
    ///
    /// Returns the new top-level entities and the ticket tracking any
    /// template restores deferred on unloaded assets.
    pub fn restore_snapshot(
        &mut self,
        blob: &SnapshotBlob,
        parent: Option<EntityId>,
        insert_before: Option<EntityId>,
        make_new_ids: bool,
    ) -> EditorResult<(Vec<EntityId>, RestoreTicket)> {
        let ticket = RestoreTicket::new();
        let created = self.restore_into(blob, parent, insert_before, make_new_ids, &ticket)?;
        Ok((created, ticket))
    }

    /// Restore a snapshot, accounting deferred restores on an existing ticket
    pub fn restore_into(
        &mut self,
        blob: &SnapshotBlob,
        parent: Option<EntityId>,
        insert_before: Option<EntityId>,
        make_new_ids: bool,
        ticket: &RestoreTicket,
    ) -> EditorResult<Vec<EntityId>> {
        if let Some(parent) = parent {
            if !self.all_exist(&[parent]) {
                return Err(StructuralError::MissingParent(parent).into());
            }
        }

        let outcome = match SnapshotCodec::restore(
            blob,
            &mut self.world,
            &mut self.templates,
            &self.assets,
            &mut self.deferred,
            ticket,
            make_new_ids,
        ) {
            Ok(outcome) => outcome,
            Err(err @ SnapshotError::SchemaMismatch { .. }) => {
                self.report_error(INCOMPATIBLE_FORMAT_MESSAGE);
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let items = outcome
            .created
            .iter()
            .map(|entity| AttachItem {
                entity: *entity,
                parent,
                insert_before,
            })
            .collect();
        if let Err(err) = apply_structural_change(&mut self.tree, &mut self.world, StructuralChange::Attach(items)) {
            tracing::error!("Restored entities could not be attached: {err}");
            for entity in &outcome.created {
                if let Ok(destroyed) = self.world.destroy_entity(*entity) {
                    for id in destroyed {
                        self.templates.remove_entity(id);
                    }
                }
            }
            return Err(err.into());
        }

        self.notify(EditorNotification::EntitiesAddedOrRemoved);
        Ok(outcome.created)
    }

    /// Pump the asset system and drain every deferred restore it unblocks
    ///
    /// Returns the number of asset-ready events handled.
    pub fn pump_asset_events(&mut self) -> usize {
        let events = self.assets.pump_events();
        for event in &events {
            self.handle_asset_ready(event.asset);
        }
        events.len()
    }

    /// Drain deferred restores waiting on `asset`
    ///
    /// Each entity is re-attached to its template instance. An entity whose
    /// re-attachment fails is destroyed and reported, never left half built.
    pub fn handle_asset_ready(&mut self, asset: AssetId) {
        let ready = self.deferred.take_ready(asset);
        if ready.is_empty() {
            return;
        }
        tracing::debug!("Draining {} deferred restore(s) for asset {asset}", ready.len());

        for request in ready {
            if request.is_cancelled() {
                request.complete(false);
                continue;
            }
            if !self.world.contains(request.entity) {
                tracing::debug!("Deferred restore target {} is gone", request.entity);
                request.complete(false);
                continue;
            }
            match self.templates.restore_entity(request.entity, &request.restore_info) {
                Ok(_) => request.complete(false),
                Err(err) => {
                    let entity = request.entity;
                    request.complete(true);
                    if let Err(destroy_err) = self.destroy_entities(&[entity]) {
                        tracing::error!("Failed to destroy orphaned entity {entity}: {destroy_err}");
                    }
                    self.report_error(format!("Failed to restore template instance for {entity}: {err}"));
                }
            }
        }
    }

    /// Block until a restore ticket resolves, pumping asset events meanwhile
    pub fn wait_for_restore(&mut self, ticket: &RestoreTicket) -> Result<Vec<EntityId>, RestoreError> {
        let started = Instant::now();
        loop {
            match ticket.status() {
                Some(RestoreStatus::Completed { failed }) => return Ok(failed),
                Some(RestoreStatus::Cancelled) => return Err(RestoreError::Cancelled),
                None => {}
            }
            if self.pump_asset_events() > 0 {
                continue;
            }
            if started.elapsed() >= self.config.restore_timeout() {
                tracing::warn!("Gave up waiting for {} template restore(s)", ticket.outstanding());
                return Err(RestoreError::TimedOut {
                    outstanding: ticket.outstanding(),
                });
            }
            std::thread::sleep(self.config.poll_interval());
        }
    }

    /// Block until a template asset is resident, requesting its load if needed
    pub fn wait_for_asset(&mut self, asset: AssetId) -> Result<(), RestoreError> {
        self.assets.request_load(asset);
        let started = Instant::now();
        while !self.assets.is_ready(asset) {
            if self.pump_asset_events() > 0 {
                continue;
            }
            if started.elapsed() >= self.config.restore_timeout() {
                return Err(RestoreError::TimedOut { outstanding: 1 });
            }
            std::thread::sleep(self.config.poll_interval());
        }
        Ok(())
    }

    /// Drop every pending deferred restore and the selection without touching the runtime graph
    pub fn teardown(&mut self) {
        let dropped = self.deferred.clear();
        self.clipboard = None;
        self.selection.clear();
        self.tree.sync_selection(&self.selection);
        tracing::info!("Hierarchy teardown ({dropped} deferred restore(s) dropped)");
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(HierarchyConfig::default())
    }
}

/// Drop ids nested under other ids of the set and order the rest by display position
pub fn top_level_in_order(tree: &HierarchyTree, ids: &[EntityId]) -> Vec<EntityId> {
    let positions = tree.preorder_positions();
    let mut top: Vec<EntityId> = Vec::new();
    for id in ids {
        if !positions.contains_key(id) || top.contains(id) {
            continue;
        }
        if ids.iter().any(|other| other != id && tree.is_ancestor(*other, *id)) {
            continue;
        }
        top.push(*id);
    }
    top.sort_by_key(|id| positions.get(id).copied().unwrap_or(usize::MAX));
    top
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateDefinition;
    use crate::test_support::{init_tracing, scene};

    #[test]
    fn test_top_level_in_order() {
        let (state, ids) = scene(&[("A", None), ("B", None), ("A1", Some(0))]);
        let (a, b, a1) = (ids[0], ids[1], ids[2]);
        assert_eq!(top_level_in_order(&state.tree, &[b, a1, a]), vec![a, b]);
        assert_eq!(top_level_in_order(&state.tree, &[a1, b]), vec![a1, b]);
    }

    #[test]
    fn test_destroy_prunes_selection_and_links() {
        let (mut state, ids) = scene(&[("A", None), ("A1", Some(0))]);
        state.set_selection(&[ids[1]]);
        state.take_notifications();

        state.destroy_entities(&[ids[0]]).unwrap();
        assert!(state.selection.is_empty());
        assert!(state.world.is_empty());
        assert_eq!(
            state.take_notifications(),
            vec![
                EditorNotification::SelectionChanged(vec![]),
                EditorNotification::EntitiesAddedOrRemoved
            ]
        );
    }

    #[test]
    fn test_deferred_drain_resolves_both_requests() {
        init_tracing();
        let mut state = EditorState::default();
        let asset = state.templates.register_template(TemplateDefinition::new("Card"));
        let ticket = RestoreTicket::new();
        let entities: Vec<EntityId> = (0..2)
            .map(|i| state.create_entity(&format!("Card {i}"), None, None).unwrap())
            .collect();
        let info = crate::template::RestoreInfo {
            asset,
            instance: crate::ids::InstanceId::new(),
            local_id: 0,
        };
        for entity in &entities {
            state.deferred.enqueue(*entity, info, &ticket);
        }
        assert!(state.assets.request_load(asset));

        assert_eq!(state.pump_asset_events(), 1);
        assert!(!state.deferred.has_pending_requests());
        assert_eq!(state.templates.instance_members(info.instance), entities);
        assert_eq!(state.wait_for_restore(&ticket), Ok(vec![]));
    }

    #[test]
    fn test_failed_deferred_restore_destroys_entity() {
        let mut state = EditorState::default();
        let asset = state.templates.register_template(TemplateDefinition::new("Card"));
        let entity = state.create_entity("Broken", None, None).unwrap();
        let ticket = RestoreTicket::new();
        let info = crate::template::RestoreInfo {
            asset,
            instance: crate::ids::InstanceId::new(),
            local_id: 7,
        };
        state.deferred.enqueue(entity, info, &ticket);
        state.assets.request_load(asset);
        state.take_notifications();

        assert_eq!(state.wait_for_restore(&ticket), Ok(vec![entity]));
        assert!(!state.world.contains(entity));
        assert!(!state.tree.contains(entity));
        assert!(state
            .take_notifications()
            .iter()
            .any(|n| matches!(n, EditorNotification::Error(_))));
    }

    #[test]
    fn test_teardown_cancels_pending_restores() {
        let mut state = EditorState::default();
        let asset = state.templates.register_template(TemplateDefinition::new("Card"));
        let entity = state.create_entity("Pending", None, None).unwrap();
        let ticket = RestoreTicket::new();
        let info = crate::template::RestoreInfo {
            asset,
            instance: crate::ids::InstanceId::new(),
            local_id: 0,
        };
        state.deferred.enqueue(entity, info, &ticket);
        state.set_selection(&[entity]);

        state.teardown();
        assert!(state.selection.is_empty());
        assert!(!state.tree.node(entity).unwrap().selected);
        assert_eq!(state.wait_for_restore(&ticket), Err(RestoreError::Cancelled));
        assert!(state.world.contains(entity));
        assert_eq!(state.templates.instance_of(entity), None);
    }

    #[test]
    fn test_wait_times_out_without_load() {
        let mut state = EditorState::new(HierarchyConfig {
            restore_poll_interval_ms: 1,
            restore_timeout_ms: 5,
            ..Default::default()
        });
        let asset = state.templates.register_template(TemplateDefinition::new("Never"));
        let entity = state.create_entity("Waiting", None, None).unwrap();
        let ticket = RestoreTicket::new();
        let info = crate::template::RestoreInfo {
            asset,
            instance: crate::ids::InstanceId::new(),
            local_id: 0,
        };
        state.deferred.enqueue(entity, info, &ticket);

        assert_eq!(
            state.wait_for_restore(&ticket),
            Err(RestoreError::TimedOut { outstanding: 1 })
        );
    }
}
