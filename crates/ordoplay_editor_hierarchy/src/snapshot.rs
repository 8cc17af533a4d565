// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapshot codec for entity subtrees.
//!
//! A snapshot is a versioned object graph holding a list of top-level
//! entities, all of their descendants (parent before child), and the
//! template-instance restore info of every entity. It is used both for
//! undo/redo and for the clipboard.
//!
//! ## Encodings
//!
//! - [`SnapshotEncoding::Text`] - RON, human readable, used for the clipboard
//! - [`SnapshotEncoding::Binary`] - bincode, compact, used for undo history
//!
//! Both start with the schema version, which is probed before the body is
//! decoded. A mismatch is a hard failure; nothing is created.

use crate::assets::{AssetHandle, AssetManager};
use crate::deferred::{DeferredRestoreQueue, RestoreTicket};
use crate::ids::{AssetId, EntityId, InstanceId};
use crate::template::{RestoreInfo, TemplateError, TemplateInstanceService};
use crate::world::{EditorFlags, EntityAuthoring, PropertyMap, WorldError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 2;

/// Snapshot errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The blob is empty (capture failed or nothing was captured)
    #[error("Snapshot is empty")]
    Empty,

    /// The blob was produced by an incompatible schema
    #[error("Incompatible snapshot format: version {found}, expected {expected}")]
    SchemaMismatch {
        /// Version found in the blob
        found: u32,
        /// Version this build understands
        expected: u32,
    },

    /// Serialization failed
    #[error("Snapshot encode error: {0}")]
    Encode(String),

    /// Deserialization failed
    #[error("Snapshot decode error: {0}")]
    Decode(String),

    /// Entity-authoring failure while restoring
    #[error("World error: {0}")]
    World(#[from] WorldError),
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

/// Wire encoding of a snapshot blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapshotEncoding {
    /// RON text
    Text,
    /// bincode
    #[default]
    Binary,
}

/// An encoded snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotBlob {
    /// Encoding of `data`
    pub encoding: SnapshotEncoding,
    /// Encoded document
    pub data: Vec<u8>,
}

impl SnapshotBlob {
    /// An empty blob, meaning "nothing to do"
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap clipboard text
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            encoding: SnapshotEncoding::Text,
            data: text.into().into_bytes(),
        }
    }

    /// Check if the blob is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Text form of a text-encoded blob
    pub fn as_text(&self) -> Option<&str> {
        match self.encoding {
            SnapshotEncoding::Text => std::str::from_utf8(&self.data).ok(),
            SnapshotEncoding::Binary => None,
        }
    }
}

/// One serialized entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity identifier
    pub id: EntityId,
    /// Parent inside the snapshot (`None` for top-level entities)
    pub parent: Option<EntityId>,
    /// Entity name
    pub name: String,
    /// Whether the entity is active
    pub active: bool,
    /// Editor flags
    pub flags: EditorFlags,
    /// Component properties
    pub properties: PropertyMap,
    /// Template-instance linkage
    pub restore_info: Option<RestoreInfo>,
}

/// The versioned object graph stored in a blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Schema version; must stay the first field
    pub version: u32,
    /// Top-level entities in capture order
    pub top_level: Vec<EntitySnapshot>,
    /// Descendants of the top-level entities, parent before child
    pub descendants: Vec<EntitySnapshot>,
}

impl Default for SnapshotDocument {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            top_level: Vec::new(),
            descendants: Vec::new(),
        }
    }
}

impl SnapshotDocument {
    /// Iterate over every entity, top level first
    pub fn entities(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.top_level.iter().chain(self.descendants.iter())
    }

    fn entities_mut(&mut self) -> impl Iterator<Item = &mut EntitySnapshot> {
        self.top_level.iter_mut().chain(self.descendants.iter_mut())
    }

    /// Every template asset referenced by the document
    pub fn referenced_assets(&self) -> Vec<AssetId> {
        let mut assets: Vec<AssetId> = Vec::new();
        for info in self.entities().filter_map(|e| e.restore_info) {
            if !assets.contains(&info.asset) {
                assets.push(info.asset);
            }
        }
        assets
    }

    /// Strip template linkage from every instance that is only partly captured
    pub fn detach_partial_instances(&mut self, templates: &dyn TemplateInstanceService) {
        let captured: HashSet<EntityId> = self.entities().map(|e| e.id).collect();
        let mut complete: HashMap<InstanceId, bool> = HashMap::new();
        for info in self.entities().filter_map(|e| e.restore_info) {
            complete.entry(info.instance).or_insert_with(|| {
                templates
                    .instance_members(info.instance)
                    .iter()
                    .all(|member| captured.contains(member))
            });
        }

        for entity in self.entities_mut() {
            let Some(info) = entity.restore_info else {
                continue;
            };
            if !complete.get(&info.instance).copied().unwrap_or(false) {
                tracing::debug!(
                    "Detaching {} from partially captured instance {}",
                    entity.id,
                    info.instance
                );
                entity.restore_info = None;
            }
        }
    }

    /// Give every entity and instance a fresh identifier
    ///
    /// All assignments are collected first, then every reference in the
    /// document is rewritten, so forward and backward references both work.
    /// References to entities outside the document are left untouched.
    pub fn remap_ids(&mut self) -> HashMap<EntityId, EntityId> {
        let mut entity_map: HashMap<EntityId, EntityId> = HashMap::new();
        let mut instance_map: HashMap<InstanceId, InstanceId> = HashMap::new();
        for entity in self.entities() {
            entity_map.insert(entity.id, EntityId::new());
            if let Some(info) = entity.restore_info {
                instance_map.entry(info.instance).or_insert_with(InstanceId::new);
            }
        }

        let mut lookup = |id: EntityId| entity_map.get(&id).copied().unwrap_or(id);
        for entity in self.entities_mut() {
            entity.id = lookup(entity.id);
            entity.parent = entity.parent.map(&mut lookup);
            for value in entity.properties.values_mut() {
                value.remap_entities(&mut lookup);
            }
            if let Some(info) = entity.restore_info.as_mut() {
                if let Some(instance) = instance_map.get(&info.instance) {
                    info.instance = *instance;
                }
            }
        }
        entity_map
    }
}

/// Result of a capture
#[derive(Debug, Clone, Default)]
pub struct CaptureResult {
    /// Encoded snapshot; empty when capture failed
    pub blob: SnapshotBlob,
    /// Strong references to every template asset the blob mentions
    pub referenced_assets: Vec<AssetHandle>,
}

/// Result of restoring a blob as loose entities
#[derive(Debug, Clone, Default)]
pub struct RestoreOutcome {
    /// Surviving top-level entities, in snapshot order, not yet attached
    pub created: Vec<EntityId>,
    /// Linkage re-established immediately
    pub restore_infos: Vec<(EntityId, RestoreInfo)>,
    /// Old to new identifiers when fresh ids were generated
    pub id_map: HashMap<EntityId, EntityId>,
}

/// Header probe for text snapshots
#[derive(Deserialize)]
struct SnapshotHeader {
    version: u32,
}

/// Serializes entity subtrees to blobs and back
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotCodec {
    encoding: SnapshotEncoding,
    pretty: bool,
}

impl SnapshotCodec {
    /// Create a codec producing the given encoding
    pub fn new(encoding: SnapshotEncoding) -> Self {
        Self {
            encoding,
            pretty: false,
        }
    }

    /// Codec producing RON text
    pub fn text() -> Self {
        Self::new(SnapshotEncoding::Text)
    }

    /// Codec producing bincode
    pub fn binary() -> Self {
        Self::new(SnapshotEncoding::Binary)
    }

    /// Pretty-print text output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Build the document for a set of top-level entities and their descendants
    ///
    /// Entities that no longer exist are skipped. For copies, template
    /// linkage of partly captured instances is stripped.
    pub fn capture_document(
        &self,
        world: &dyn EntityAuthoring,
        templates: &dyn TemplateInstanceService,
        entities: &[EntityId],
        is_copy: bool,
    ) -> SnapshotDocument {
        let mut document = SnapshotDocument::default();
        for &top in entities {
            let Some(snapshot) = snapshot_entity(world, templates, top, None) else {
                tracing::warn!("Skipping capture of missing entity {top}");
                continue;
            };
            document.top_level.push(snapshot);
            collect_descendants(world, templates, top, &mut document.descendants);
        }
        if is_copy {
            document.detach_partial_instances(templates);
        }
        document
    }

    /// Capture entities into a blob plus strong references to their template assets
    ///
    /// Encoding failure is logged and yields an empty blob.
    pub fn capture(
        &self,
        world: &dyn EntityAuthoring,
        templates: &dyn TemplateInstanceService,
        assets: &AssetManager,
        entities: &[EntityId],
        is_copy: bool,
    ) -> CaptureResult {
        let document = self.capture_document(world, templates, entities, is_copy);
        let blob = match self.encode(&document) {
            Ok(blob) => blob,
            Err(err) => {
                tracing::error!("Failed to capture {} entities: {err}", entities.len());
                return CaptureResult::default();
            }
        };
        let referenced_assets = document
            .referenced_assets()
            .into_iter()
            .map(|asset| assets.acquire(asset))
            .collect();
        CaptureResult {
            blob,
            referenced_assets,
        }
    }

    /// Encode a document
    pub fn encode(&self, document: &SnapshotDocument) -> SnapshotResult<SnapshotBlob> {
        let data = match self.encoding {
            SnapshotEncoding::Text => {
                let text = if self.pretty {
                    ron::ser::to_string_pretty(document, ron::ser::PrettyConfig::default())
                } else {
                    ron::to_string(document)
                }
                .map_err(|e| SnapshotError::Encode(e.to_string()))?;
                text.into_bytes()
            }
            SnapshotEncoding::Binary => {
                bincode::serialize(document).map_err(|e| SnapshotError::Encode(e.to_string()))?
            }
        };
        Ok(SnapshotBlob {
            encoding: self.encoding,
            data,
        })
    }

    /// Decode a blob, rejecting other schema versions before parsing the body
    pub fn decode(blob: &SnapshotBlob) -> SnapshotResult<SnapshotDocument> {
        if blob.is_empty() {
            return Err(SnapshotError::Empty);
        }
        match blob.encoding {
            SnapshotEncoding::Text => {
                let text = std::str::from_utf8(&blob.data)
                    .map_err(|e| SnapshotError::Decode(e.to_string()))?;
                let header: SnapshotHeader =
                    ron::from_str(text).map_err(|e| SnapshotError::Decode(e.to_string()))?;
                check_version(header.version)?;
                ron::from_str(text).map_err(|e| SnapshotError::Decode(e.to_string()))
            }
            SnapshotEncoding::Binary => {
                let version: u32 = bincode::deserialize(&blob.data)
                    .map_err(|e| SnapshotError::Decode(e.to_string()))?;
                check_version(version)?;
                bincode::deserialize(&blob.data).map_err(|e| SnapshotError::Decode(e.to_string()))
            }
        }
    }

    /// Recreate the entities of a blob as loose (unattached) entities
    ///
    /// With `make_new_ids`, every entity and instance gets a fresh identifier
    /// so pasted copies never share an instance with the original. Entities
    /// whose template asset is not resident are queued on `deferred` under
    /// `ticket`; entities whose linkage is rejected are destroyed and pruned
    /// from the result.
    pub fn restore(
        blob: &SnapshotBlob,
        world: &mut dyn EntityAuthoring,
        templates: &mut dyn TemplateInstanceService,
        assets: &AssetManager,
        deferred: &mut DeferredRestoreQueue,
        ticket: &RestoreTicket,
        make_new_ids: bool,
    ) -> SnapshotResult<RestoreOutcome> {
        let mut document = Self::decode(blob)?;
        let id_map = if make_new_ids {
            document.remap_ids()
        } else {
            HashMap::new()
        };

        if let Some(clash) = document.entities().find(|e| world.contains(e.id)) {
            return Err(SnapshotError::World(WorldError::EntityExists(clash.id)));
        }

        if let Err(err) = create_entities(world, &document) {
            for entity in document.top_level.iter().chain(document.descendants.iter()) {
                if world.contains(entity.id) {
                    let _ = world.destroy_entity(entity.id);
                }
            }
            return Err(err.into());
        }

        let mut restore_infos = Vec::new();
        for entity in document.entities() {
            let Some(info) = entity.restore_info else {
                continue;
            };
            // Destroyed together with a rejected ancestor.
            if !world.contains(entity.id) {
                continue;
            }
            match templates.restore_entity(entity.id, &info) {
                Ok(_) => restore_infos.push((entity.id, info)),
                Err(TemplateError::AssetNotReady(asset)) => {
                    assets.request_load(asset);
                    deferred.enqueue(entity.id, info, ticket);
                }
                Err(err) => {
                    tracing::warn!("Template restore rejected {}: {err}; destroying it", entity.id);
                    for destroyed in world.destroy_entity(entity.id)? {
                        templates.remove_entity(destroyed);
                    }
                }
            }
        }

        let created = document
            .top_level
            .iter()
            .map(|e| e.id)
            .filter(|id| world.contains(*id))
            .collect();
        Ok(RestoreOutcome {
            created,
            restore_infos,
            id_map,
        })
    }
}

fn check_version(found: u32) -> SnapshotResult<()> {
    if found != SNAPSHOT_VERSION {
        tracing::warn!("Rejecting snapshot with schema version {found}");
        return Err(SnapshotError::SchemaMismatch {
            found,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(())
}

fn snapshot_entity(
    world: &dyn EntityAuthoring,
    templates: &dyn TemplateInstanceService,
    id: EntityId,
    parent: Option<EntityId>,
) -> Option<EntitySnapshot> {
    Some(EntitySnapshot {
        id,
        parent,
        name: world.name(id)?,
        active: world.is_active(id)?,
        flags: world.flags(id)?,
        properties: world.properties(id)?,
        restore_info: templates.restore_info(id),
    })
}

fn collect_descendants(
    world: &dyn EntityAuthoring,
    templates: &dyn TemplateInstanceService,
    parent: EntityId,
    out: &mut Vec<EntitySnapshot>,
) {
    for child in world.children_of(Some(parent)) {
        if let Some(snapshot) = snapshot_entity(world, templates, child, Some(parent)) {
            out.push(snapshot);
            collect_descendants(world, templates, child, out);
        }
    }
}

fn create_entities(world: &mut dyn EntityAuthoring, document: &SnapshotDocument) -> Result<(), WorldError> {
    for entity in document.entities() {
        world.create_entity(entity.id, &entity.name)?;
        world.set_active(entity.id, entity.active)?;
        world.set_flags(entity.id, entity.flags)?;
        world.set_properties(entity.id, entity.properties.clone())?;
    }
    for entity in &document.descendants {
        let parent = entity.parent.ok_or(WorldError::EntityNotFound(entity.id))?;
        world.attach(entity.id, Some(parent), usize::MAX)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{TemplateDefinition, TemplateRegistry};
    use crate::world::{PropertyValue, SceneWorld};

    struct Fixture {
        world: SceneWorld,
        templates: TemplateRegistry,
        assets: AssetManager,
        deferred: DeferredRestoreQueue,
    }

    impl Fixture {
        fn new() -> Self {
            let assets = AssetManager::new();
            Self {
                world: SceneWorld::new(),
                templates: TemplateRegistry::new(assets.clone()),
                assets,
                deferred: DeferredRestoreQueue::new(),
            }
        }

        fn spawn(&mut self, name: &str, parent: Option<EntityId>) -> EntityId {
            let id = EntityId::new();
            self.world.create_entity(id, name).unwrap();
            self.world.attach(id, parent, usize::MAX).unwrap();
            id
        }

        fn restore(&mut self, blob: &SnapshotBlob, make_new_ids: bool) -> SnapshotResult<RestoreOutcome> {
            let ticket = RestoreTicket::new();
            SnapshotCodec::restore(
                blob,
                &mut self.world,
                &mut self.templates,
                &self.assets,
                &mut self.deferred,
                &ticket,
                make_new_ids,
            )
        }
    }

    fn names(world: &SceneWorld, ids: &[EntityId]) -> Vec<String> {
        ids.iter().filter_map(|id| world.name(*id)).collect()
    }

    #[test]
    fn test_round_trip_rebuilds_subtree() {
        for codec in [SnapshotCodec::text().with_pretty(true), SnapshotCodec::binary()] {
            let mut fx = Fixture::new();
            let root = fx.spawn("Root", None);
            let a = fx.spawn("A", Some(root));
            let b = fx.spawn("B", Some(root));
            fx.spawn("A1", Some(a));
            fx.world
                .set_property(b, "target", PropertyValue::Entity(a))
                .unwrap();
            fx.world
                .set_property(b, "style", PropertyValue::Json(serde_json::json!({ "color": "red" })))
                .unwrap();

            let capture = codec.capture(&fx.world, &fx.templates, &fx.assets, &[root], false);
            assert!(!capture.blob.is_empty());
            fx.world.destroy_entity(root).unwrap();
            assert!(fx.world.is_empty());

            let outcome = fx.restore(&capture.blob, false).unwrap();
            assert_eq!(outcome.created, vec![root]);
            assert!(!fx.world.is_attached(root));
            assert_eq!(names(&fx.world, &fx.world.children_of(Some(root))), vec!["A", "B"]);
            assert_eq!(names(&fx.world, &fx.world.children_of(Some(a))), vec!["A1"]);
            let props = fx.world.properties(b).unwrap();
            assert_eq!(props.get("target"), Some(&PropertyValue::Entity(a)));
            assert_eq!(
                props.get("style"),
                Some(&PropertyValue::Json(serde_json::json!({ "color": "red" })))
            );
        }
    }

    #[test]
    fn test_fresh_ids_remap_internal_references() {
        let mut fx = Fixture::new();
        let outside = fx.spawn("Outside", None);
        let root = fx.spawn("Root", None);
        let child = fx.spawn("Child", Some(root));
        fx.world
            .set_property(root, "focus", PropertyValue::Entities(vec![child, outside]))
            .unwrap();

        let capture = SnapshotCodec::text().capture(&fx.world, &fx.templates, &fx.assets, &[root], true);
        let outcome = fx.restore(&capture.blob, true).unwrap();

        let copy = outcome.created[0];
        assert_ne!(copy, root);
        let copy_child = fx.world.children_of(Some(copy))[0];
        assert_eq!(outcome.id_map.get(&child), Some(&copy_child));
        assert_eq!(
            fx.world.properties(copy).unwrap().get("focus"),
            Some(&PropertyValue::Entities(vec![copy_child, outside]))
        );
        assert_eq!(fx.world.children_of(Some(root)), vec![child]);
    }

    #[test]
    fn test_restore_rejects_existing_ids() {
        let mut fx = Fixture::new();
        let root = fx.spawn("Root", None);
        let capture = SnapshotCodec::binary().capture(&fx.world, &fx.templates, &fx.assets, &[root], false);

        let err = fx.restore(&capture.blob, false).unwrap_err();
        assert_eq!(err, SnapshotError::World(WorldError::EntityExists(root)));
        assert_eq!(fx.world.len(), 1);
    }

    #[test]
    fn test_schema_mismatch_creates_nothing() {
        let mut fx = Fixture::new();
        let document = SnapshotDocument {
            version: SNAPSHOT_VERSION + 1,
            top_level: Vec::new(),
            descendants: Vec::new(),
        };
        for encoding in [SnapshotEncoding::Text, SnapshotEncoding::Binary] {
            let blob = SnapshotCodec::new(encoding).encode(&document).unwrap();
            let err = fx.restore(&blob, false).unwrap_err();
            assert_eq!(
                err,
                SnapshotError::SchemaMismatch {
                    found: SNAPSHOT_VERSION + 1,
                    expected: SNAPSHOT_VERSION
                }
            );
        }
        assert_eq!(fx.restore(&SnapshotBlob::empty(), false).unwrap_err(), SnapshotError::Empty);
        assert!(fx.world.is_empty());
    }

    #[test]
    fn test_partial_instance_is_detached_on_copy() {
        let mut fx = Fixture::new();
        let mut template = TemplateDefinition::new("Row");
        template.add_child(0, "X");
        template.add_child(0, "Y");
        template.add_child(0, "Z");
        let asset = fx.templates.register_template(template);
        fx.assets.register_resident(asset);
        let roots = fx.templates.instantiate(&mut fx.world, asset).unwrap();
        fx.world.attach(roots[0], None, 0).unwrap();
        let members = fx.world.children_of(Some(roots[0]));
        let (x, y) = (members[0], members[1]);

        let codec = SnapshotCodec::text();
        let document = codec.capture_document(&fx.world, &fx.templates, &[x, y], true);
        assert!(document.entities().all(|e| e.restore_info.is_none()));
        let capture = codec.capture(&fx.world, &fx.templates, &fx.assets, &[x, y], true);
        assert!(capture.referenced_assets.is_empty());

        let whole = codec.capture_document(&fx.world, &fx.templates, &[roots[0]], true);
        assert_eq!(whole.entities().filter(|e| e.restore_info.is_some()).count(), 4);
        assert_eq!(whole.referenced_assets(), vec![asset]);
    }

    #[test]
    fn test_pasted_instance_gets_new_instance_id() {
        let mut fx = Fixture::new();
        let asset = fx.templates.register_template(TemplateDefinition::new("Badge"));
        fx.assets.register_resident(asset);
        let original = fx.templates.instantiate(&mut fx.world, asset).unwrap()[0];
        let original_instance = fx.templates.instance_of(original).unwrap();

        let capture = SnapshotCodec::text().capture(&fx.world, &fx.templates, &fx.assets, &[original], true);
        assert_eq!(fx.assets.ref_count(asset), 1);
        let outcome = fx.restore(&capture.blob, true).unwrap();

        let copy = outcome.created[0];
        let copy_instance = fx.templates.instance_of(copy).unwrap();
        assert_ne!(copy_instance, original_instance);
        assert_eq!(fx.templates.instance_members(original_instance), vec![original]);
    }

    #[test]
    fn test_unloaded_template_defers_restore() {
        let mut fx = Fixture::new();
        let asset = fx.templates.register_template(TemplateDefinition::new("Panel"));
        fx.assets.register_resident(asset);
        let entity = fx.templates.instantiate(&mut fx.world, asset).unwrap()[0];
        let capture = SnapshotCodec::binary().capture(&fx.world, &fx.templates, &fx.assets, &[entity], false);

        fx.world.destroy_entity(entity).unwrap();
        fx.templates.remove_entity(entity);
        drop(capture.referenced_assets);
        fx.assets.release_unreferenced();

        let outcome = fx.restore(&capture.blob, false).unwrap();
        assert_eq!(outcome.created, vec![entity]);
        assert!(outcome.restore_infos.is_empty());
        assert!(fx.deferred.has_pending_requests());
        assert!(fx.assets.has_pending_loads());
    }

    #[test]
    fn test_rejected_linkage_prunes_top_level() {
        let mut fx = Fixture::new();
        let asset = fx.templates.register_template(TemplateDefinition::new("Gone"));
        fx.assets.register_resident(asset);
        let entity = fx.templates.instantiate(&mut fx.world, asset).unwrap()[0];
        let keep = fx.spawn("Keep", None);
        let capture = SnapshotCodec::text().capture(&fx.world, &fx.templates, &fx.assets, &[entity, keep], false);
        fx.world.destroy_entity(entity).unwrap();
        fx.world.destroy_entity(keep).unwrap();
        fx.templates.clear();

        let outcome = fx.restore(&capture.blob, false).unwrap();
        assert_eq!(outcome.created, vec![keep]);
        assert!(!fx.world.contains(entity));
    }
}
