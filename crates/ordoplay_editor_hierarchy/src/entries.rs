// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialized entries: one top-level node (with its descendants) per entry.
//!
//! Position is stored as the next sibling at capture time rather than a row,
//! so reinsertion stays correct when unrelated siblings come and go. Entries
//! of a batch are ordered by display position, which lets a restore walk the
//! list and find every anchor either live or earlier in the same batch.

use crate::assets::AssetHandle;
use crate::deferred::RestoreTicket;
use crate::ids::EntityId;
use crate::snapshot::{SnapshotBlob, SnapshotCodec, SnapshotError, SnapshotResult};
use crate::state::{top_level_in_order, EditorResult, EditorState};
use crate::template::TemplateInstanceService;
use crate::world::{EntityAuthoring, WorldError};

/// Which blob of an entry to read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySide {
    /// State before the command
    Undo,
    /// State after the command
    Redo,
}

/// Snapshot of one top-level node and its position
#[derive(Debug, Clone)]
pub struct SerializedEntry {
    /// Top-level entity
    pub id: EntityId,
    /// Parent at capture time
    pub parent_id: Option<EntityId>,
    /// Next sibling at capture time
    pub insert_before_id: Option<EntityId>,
    /// Blob restored on undo
    pub undo_blob: SnapshotBlob,
    /// Blob restored on redo
    pub redo_blob: SnapshotBlob,
    /// Keeps every template asset the blobs mention loaded
    pub referenced_assets: Vec<AssetHandle>,
}

impl SerializedEntry {
    /// Blob for one side
    pub fn blob(&self, side: EntrySide) -> &SnapshotBlob {
        match side {
            EntrySide::Undo => &self.undo_blob,
            EntrySide::Redo => &self.redo_blob,
        }
    }

    fn set_blob(&mut self, side: EntrySide, blob: SnapshotBlob) {
        match side {
            EntrySide::Undo => self.undo_blob = blob,
            EntrySide::Redo => self.redo_blob = blob,
        }
    }

    fn keep_assets(&mut self, handles: Vec<AssetHandle>) {
        for handle in handles {
            if !self.referenced_assets.iter().any(|h| h.id() == handle.id()) {
                self.referenced_assets.push(handle);
            }
        }
    }
}

/// Capture one entry per top-level id into `side`
///
/// Ids nested under other ids of the set are covered by their ancestor's
/// entry. Entries come back in display order.
pub fn capture_entries(state: &EditorState, ids: &[EntityId], side: EntrySide) -> Vec<SerializedEntry> {
    let codec = state.config.undo_codec();
    let mut entries = Vec::new();
    for id in top_level_in_order(&state.tree, ids) {
        let capture = codec.capture(&state.world, &state.templates, &state.assets, &[id], false);
        if capture.blob.is_empty() {
            tracing::warn!("Nothing captured for {id}");
            continue;
        }
        let mut entry = SerializedEntry {
            id,
            parent_id: state.tree.parent_of(id),
            insert_before_id: state.tree.next_sibling(id),
            undo_blob: SnapshotBlob::empty(),
            redo_blob: SnapshotBlob::empty(),
            referenced_assets: Vec::new(),
        };
        entry.set_blob(side, capture.blob);
        entry.keep_assets(capture.referenced_assets);
        entries.push(entry);
    }
    entries
}

/// Re-capture `side` of existing entries from the live graph
pub fn recapture_entries(state: &EditorState, entries: &mut [SerializedEntry], side: EntrySide) {
    let codec = state.config.undo_codec();
    for entry in entries.iter_mut() {
        let capture = codec.capture(&state.world, &state.templates, &state.assets, &[entry.id], false);
        entry.set_blob(side, capture.blob);
        entry.keep_assets(capture.referenced_assets);
    }
}

/// Ids of every entry
pub fn entry_ids(entries: &[SerializedEntry]) -> Vec<EntityId> {
    entries.iter().map(|e| e.id).collect()
}

/// Check that every entry's node is live
pub fn entries_exist(state: &EditorState, entries: &[SerializedEntry]) -> bool {
    state.all_exist(&entry_ids(entries))
}

/// Check that no entry is live and every parent outside the batch is
pub fn entries_restorable(state: &EditorState, entries: &[SerializedEntry]) -> bool {
    let ids = entry_ids(entries);
    entries.iter().all(|entry| {
        !state.tree.contains(entry.id)
            && !state.world.contains(entry.id)
            && entry
                .parent_id
                .map_or(true, |parent| ids.contains(&parent) || state.all_exist(&[parent]))
    })
}

/// Follow insert-before anchors through not-yet-restored entries of the batch
fn resolve_anchor(state: &EditorState, entries: &[SerializedEntry], index: usize) -> Option<EntityId> {
    let mut anchor = entries[index].insert_before_id;
    for _ in 0..entries.len() {
        let candidate = anchor?;
        if state.tree.contains(candidate) {
            return Some(candidate);
        }
        anchor = entries[index + 1..]
            .iter()
            .find(|e| e.id == candidate)?
            .insert_before_id;
    }
    None
}

/// Recreate every entry from `side`, in order
///
/// Template restores blocked on unloaded assets are tracked by the returned
/// ticket. Stops at the first failure.
pub fn restore_entries(
    state: &mut EditorState,
    entries: &[SerializedEntry],
    side: EntrySide,
) -> EditorResult<(Vec<EntityId>, RestoreTicket)> {
    let ticket = RestoreTicket::new();
    let mut restored = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let blob = entry.blob(side);
        if blob.is_empty() {
            continue;
        }
        let before = resolve_anchor(state, entries, index);
        let created = state.restore_into(blob, entry.parent_id, before, false, &ticket)?;
        restored.extend(created);
    }
    Ok((restored, ticket))
}

/// Destroy every live entry node and its entity subtree
pub fn delete_entries(state: &mut EditorState, entries: &[SerializedEntry]) -> EditorResult<()> {
    let ids: Vec<EntityId> = entry_ids(entries)
        .into_iter()
        .filter(|id| state.tree.contains(*id))
        .collect();
    state.destroy_entities(&ids)?;
    Ok(())
}

/// Overwrite live entities with the contents of `side`, keeping their identity
///
/// Every entity in the blob must still exist; otherwise nothing is changed.
pub fn unserialize_in_place(
    state: &mut EditorState,
    entries: &[SerializedEntry],
    side: EntrySide,
) -> SnapshotResult<Vec<EntityId>> {
    let mut documents = Vec::with_capacity(entries.len());
    for entry in entries {
        let blob = entry.blob(side);
        if blob.is_empty() {
            continue;
        }
        documents.push(SnapshotCodec::decode(blob)?);
    }
    if let Some(missing) = documents
        .iter()
        .flat_map(|d| d.entities())
        .find(|e| !state.world.contains(e.id))
    {
        return Err(SnapshotError::World(WorldError::EntityNotFound(missing.id)));
    }

    let mut touched = Vec::new();
    for entity in documents.iter().flat_map(|d| d.entities()) {
        state.world.set_name(entity.id, &entity.name)?;
        state.world.set_active(entity.id, entity.active)?;
        state.world.set_flags(entity.id, entity.flags)?;
        state.world.set_properties(entity.id, entity.properties.clone())?;
        if let Some(node) = state.tree.node_mut(entity.id) {
            node.expanded = entity.flags.expanded;
        }
        match entity.restore_info {
            Some(info) if state.templates.restore_info(entity.id) != Some(info) => {
                if let Err(err) = state.templates.restore_entity(entity.id, &info) {
                    tracing::warn!("Could not relink {} to its template instance: {err}", entity.id);
                }
            }
            None => {
                state.templates.remove_entity(entity.id);
            }
            Some(_) => {}
        }
        touched.push(entity.id);
    }
    Ok(touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assert_layers_agree, child_names, scene};
    use crate::world::PropertyValue;

    #[test]
    fn test_capture_skips_nested_and_orders_by_display() {
        let (state, ids) = scene(&[("A", None), ("B", None), ("A1", Some(0))]);
        let entries = capture_entries(&state, &[ids[1], ids[2], ids[0]], EntrySide::Undo);
        assert_eq!(entry_ids(&entries), vec![ids[0], ids[1]]);
        assert_eq!(entries[0].insert_before_id, Some(ids[1]));
        assert_eq!(entries[1].insert_before_id, None);
        assert!(entries[0].redo_blob.is_empty());
    }

    #[test]
    fn test_restore_uses_anchor_chain() {
        let (mut state, ids) = scene(&[("A", None), ("B", None), ("C", None), ("D", None)]);
        let entries = capture_entries(&state, &[ids[1], ids[2]], EntrySide::Undo);
        delete_entries(&mut state, &entries).unwrap();
        assert_eq!(child_names(&state, None), vec!["A", "D"]);

        assert!(entries_restorable(&state, &entries));
        let (restored, ticket) = restore_entries(&mut state, &entries, EntrySide::Undo).unwrap();
        assert_eq!(restored, vec![ids[1], ids[2]]);
        assert!(ticket.is_finished());
        assert_eq!(child_names(&state, None), vec!["A", "B", "C", "D"]);
        assert_layers_agree(&state);
    }

    #[test]
    fn test_restore_appends_when_anchor_is_gone() {
        let (mut state, ids) = scene(&[("A", None), ("B", None), ("C", None)]);
        let entries = capture_entries(&state, &[ids[0]], EntrySide::Undo);
        delete_entries(&mut state, &entries).unwrap();
        state.destroy_entities(&[ids[1]]).unwrap();

        restore_entries(&mut state, &entries, EntrySide::Undo).unwrap();
        assert_eq!(child_names(&state, None), vec!["C", "A"]);
    }

    #[test]
    fn test_unserialize_in_place_keeps_identity() {
        let (mut state, ids) = scene(&[("Panel", None), ("Label", Some(0))]);
        let mut entries = capture_entries(&state, &[ids[0]], EntrySide::Undo);
        state
            .world
            .set_property(ids[1], "text", PropertyValue::Text("after".into()))
            .unwrap();
        recapture_entries(&state, &mut entries, EntrySide::Redo);

        let touched = unserialize_in_place(&mut state, &entries, EntrySide::Undo).unwrap();
        assert_eq!(touched, vec![ids[0], ids[1]]);
        assert!(state.world.properties(ids[1]).unwrap().is_empty());

        unserialize_in_place(&mut state, &entries, EntrySide::Redo).unwrap();
        assert_eq!(
            state.world.properties(ids[1]).unwrap().get("text"),
            Some(&PropertyValue::Text("after".into()))
        );
    }

    #[test]
    fn test_unserialize_in_place_rejects_missing_entity() {
        let (mut state, ids) = scene(&[("Panel", None), ("Label", Some(0))]);
        let entries = capture_entries(&state, &[ids[0]], EntrySide::Undo);
        state.destroy_entities(&[ids[1]]).unwrap();
        state.world.set_name(ids[0], "Renamed").unwrap();

        let err = unserialize_in_place(&mut state, &entries, EntrySide::Undo).unwrap_err();
        assert_eq!(err, SnapshotError::World(WorldError::EntityNotFound(ids[1])));
        assert_eq!(state.world.name(ids[0]).as_deref(), Some("Renamed"));
    }
}
