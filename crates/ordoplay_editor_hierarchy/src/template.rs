// SPDX-License-Identifier: MIT OR Apache-2.0
//! Template (prefab/slice) instances.
//!
//! Templates are reusable authored subtrees stored as assets. Live entities
//! can belong to an instance of a template; the link is described by a
//! [`RestoreInfo`] so that a serialized entity can be re-attached to the
//! instance it came from.

use crate::assets::AssetManager;
use crate::ids::{AssetId, EntityId, InstanceId};
use crate::world::{EntityAuthoring, PropertyMap, WorldError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Template service errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The template asset is not resident yet
    #[error("Template asset not ready: {0}")]
    AssetNotReady(AssetId),

    /// No template definition is registered for the asset
    #[error("Unknown template asset: {0}")]
    UnknownTemplate(AssetId),

    /// The restore info names an entity the template does not have
    #[error("Template {asset} has no entity with local id {local_id}")]
    InvalidLocalId {
        /// Template asset
        asset: AssetId,
        /// Offending local id
        local_id: u32,
    },

    /// The instance already exists for a different asset
    #[error("Instance {instance} belongs to asset {expected}, not {found}")]
    InstanceAssetMismatch {
        /// Instance being joined
        instance: InstanceId,
        /// Asset the instance was created from
        expected: AssetId,
        /// Asset named by the restore info
        found: AssetId,
    },

    /// Entity-authoring failure while instantiating
    #[error("World error: {0}")]
    World(#[from] WorldError),
}

/// Result type for template operations
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

/// Links a live entity back to the template instance it was instantiated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestoreInfo {
    /// Template asset
    pub asset: AssetId,
    /// Instance the entity belongs to
    pub instance: InstanceId,
    /// Entity's local id within the template
    pub local_id: u32,
}

/// Address of an instance after a successful restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceAddress {
    /// Template asset
    pub asset: AssetId,
    /// Instance
    pub instance: InstanceId,
}

/// The template-instance service consumed by the snapshot codec
pub trait TemplateInstanceService {
    /// Restore info for an entity, if it belongs to an instance
    fn restore_info(&self, entity: EntityId) -> Option<RestoreInfo>;

    /// Re-attach an entity to the instance named by `info`
    fn restore_entity(&mut self, entity: EntityId, info: &RestoreInfo) -> TemplateResult<InstanceAddress>;

    /// Unlink an entity from its instance
    fn remove_entity(&mut self, entity: EntityId) -> bool;

    /// Every entity currently linked to an instance
    fn instance_members(&self, instance: InstanceId) -> Vec<EntityId>;
}

/// An entity within a template definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateEntity {
    /// Local ID within the template
    pub local_id: u32,
    /// Entity name
    pub name: String,
    /// Local id of the parent (`None` for template roots)
    pub parent: Option<u32>,
    /// Initial component properties
    pub properties: PropertyMap,
}

/// A template asset definition
///
/// Entities are listed parent before child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Asset identifier
    pub asset: AssetId,
    /// Display name
    pub name: String,
    /// Entities in pre-order
    pub entities: Vec<TemplateEntity>,
    /// Version for format compatibility
    pub version: u32,
}

impl TemplateDefinition {
    /// Current template format version
    pub const FORMAT_VERSION: u32 = 1;

    /// Create a template with a single root entity
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            asset: AssetId::new(),
            entities: vec![TemplateEntity {
                local_id: 0,
                name: name.clone(),
                parent: None,
                properties: PropertyMap::new(),
            }],
            name,
            version: Self::FORMAT_VERSION,
        }
    }

    /// Append a child entity, returning its local id
    pub fn add_child(&mut self, parent: u32, name: impl Into<String>) -> u32 {
        let local_id = self.entities.len() as u32;
        self.entities.push(TemplateEntity {
            local_id,
            name: name.into(),
            parent: Some(parent),
            properties: PropertyMap::new(),
        });
        local_id
    }

    /// Check whether the template defines a local id
    pub fn has_local_id(&self, local_id: u32) -> bool {
        self.entities.iter().any(|e| e.local_id == local_id)
    }

    /// Count total entities in this template
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Serialize to RON format
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON format
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }
}

/// A live instance of a template
#[derive(Debug, Clone)]
pub struct TemplateInstance {
    /// Instance identifier
    pub id: InstanceId,
    /// Source template asset
    pub asset: AssetId,
    /// Member entities mapped to their template local ids
    pub members: IndexMap<EntityId, u32>,
}

/// Registry of template definitions and live instances
#[derive(Debug)]
pub struct TemplateRegistry {
    assets: AssetManager,
    definitions: HashMap<AssetId, TemplateDefinition>,
    instances: HashMap<InstanceId, TemplateInstance>,
    membership: HashMap<EntityId, InstanceId>,
}

impl TemplateRegistry {
    /// Create a registry backed by the given asset manager
    pub fn new(assets: AssetManager) -> Self {
        Self {
            assets,
            definitions: HashMap::new(),
            instances: HashMap::new(),
            membership: HashMap::new(),
        }
    }

    /// Register a template definition; the asset starts unloaded
    pub fn register_template(&mut self, definition: TemplateDefinition) -> AssetId {
        let asset = definition.asset;
        self.assets.register(asset);
        self.definitions.insert(asset, definition);
        asset
    }

    /// Get a template definition
    pub fn definition(&self, asset: AssetId) -> Option<&TemplateDefinition> {
        self.definitions.get(&asset)
    }

    /// Get an instance
    pub fn instance(&self, id: InstanceId) -> Option<&TemplateInstance> {
        self.instances.get(&id)
    }

    /// Instance an entity belongs to
    pub fn instance_of(&self, entity: EntityId) -> Option<InstanceId> {
        self.membership.get(&entity).copied()
    }

    /// Number of live instances
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Instantiate a resident template as loose entities
    ///
    /// Returns the template roots; their descendants are attached beneath them.
    pub fn instantiate(
        &mut self,
        world: &mut dyn EntityAuthoring,
        asset: AssetId,
    ) -> TemplateResult<Vec<EntityId>> {
        if !self.assets.is_ready(asset) {
            return Err(TemplateError::AssetNotReady(asset));
        }
        let definition = self
            .definitions
            .get(&asset)
            .ok_or(TemplateError::UnknownTemplate(asset))?
            .clone();

        let instance = InstanceId::new();
        let mut local_to_entity: HashMap<u32, EntityId> = HashMap::new();
        let mut roots = Vec::new();

        for template_entity in &definition.entities {
            let id = EntityId::new();
            world.create_entity(id, &template_entity.name)?;
            world.set_properties(id, template_entity.properties.clone())?;
            match template_entity.parent.and_then(|p| local_to_entity.get(&p)) {
                Some(parent) => world.attach(id, Some(*parent), usize::MAX)?,
                None => roots.push(id),
            }
            local_to_entity.insert(template_entity.local_id, id);
            self.link(id, asset, instance, template_entity.local_id);
        }

        tracing::debug!(
            "Instantiated template '{}' as instance {instance} ({} entities)",
            definition.name,
            definition.entities.len()
        );
        Ok(roots)
    }

    fn link(&mut self, entity: EntityId, asset: AssetId, instance: InstanceId, local_id: u32) {
        self.instances
            .entry(instance)
            .or_insert_with(|| TemplateInstance {
                id: instance,
                asset,
                members: IndexMap::new(),
            })
            .members
            .insert(entity, local_id);
        self.membership.insert(entity, instance);
    }

    /// Drop all definitions and instances
    pub fn clear(&mut self) {
        self.definitions.clear();
        self.instances.clear();
        self.membership.clear();
    }
}

impl TemplateInstanceService for TemplateRegistry {
    fn restore_info(&self, entity: EntityId) -> Option<RestoreInfo> {
        let instance_id = self.membership.get(&entity)?;
        let instance = self.instances.get(instance_id)?;
        let local_id = *instance.members.get(&entity)?;
        Some(RestoreInfo {
            asset: instance.asset,
            instance: instance.id,
            local_id,
        })
    }

    fn restore_entity(&mut self, entity: EntityId, info: &RestoreInfo) -> TemplateResult<InstanceAddress> {
        if !self.assets.is_ready(info.asset) {
            return Err(TemplateError::AssetNotReady(info.asset));
        }
        let definition = self
            .definitions
            .get(&info.asset)
            .ok_or(TemplateError::UnknownTemplate(info.asset))?;
        if !definition.has_local_id(info.local_id) {
            return Err(TemplateError::InvalidLocalId {
                asset: info.asset,
                local_id: info.local_id,
            });
        }
        if let Some(existing) = self.instances.get(&info.instance) {
            if existing.asset != info.asset {
                return Err(TemplateError::InstanceAssetMismatch {
                    instance: info.instance,
                    expected: existing.asset,
                    found: info.asset,
                });
            }
        }

        self.remove_entity(entity);
        self.link(entity, info.asset, info.instance, info.local_id);
        Ok(InstanceAddress {
            asset: info.asset,
            instance: info.instance,
        })
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        let Some(instance_id) = self.membership.remove(&entity) else {
            return false;
        };
        if let Some(instance) = self.instances.get_mut(&instance_id) {
            instance.members.shift_remove(&entity);
            if instance.members.is_empty() {
                self.instances.remove(&instance_id);
            }
        }
        true
    }

    fn instance_members(&self, instance: InstanceId) -> Vec<EntityId> {
        self.instances
            .get(&instance)
            .map(|i| i.members.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::SceneWorld;

    fn button_template() -> TemplateDefinition {
        let mut template = TemplateDefinition::new("Button");
        template.add_child(0, "Label");
        template.add_child(0, "Icon");
        template
    }

    #[test]
    fn test_template_serialization() {
        let template = button_template();
        let ron = template.to_ron().unwrap();
        let loaded = TemplateDefinition::from_ron(&ron).unwrap();
        assert_eq!(loaded.name, "Button");
        assert_eq!(loaded.entity_count(), 3);
    }

    #[test]
    fn test_instantiate_requires_resident_asset() {
        let assets = AssetManager::new();
        let mut registry = TemplateRegistry::new(assets.clone());
        let mut world = SceneWorld::new();
        let asset = registry.register_template(button_template());

        let err = registry.instantiate(&mut world, asset).unwrap_err();
        assert_eq!(err, TemplateError::AssetNotReady(asset));

        assets.request_load(asset);
        assets.pump_events();
        let roots = registry.instantiate(&mut world, asset).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(world.children_of(Some(roots[0])).len(), 2);

        let info = registry.restore_info(roots[0]).unwrap();
        assert_eq!(info.asset, asset);
        assert_eq!(info.local_id, 0);
        assert_eq!(registry.instance_members(info.instance).len(), 3);
    }

    #[test]
    fn test_restore_entity_rejects_unknown_local_id() {
        let assets = AssetManager::new();
        let mut registry = TemplateRegistry::new(assets.clone());
        let asset = registry.register_template(button_template());
        assets.register_resident(asset);

        let info = RestoreInfo {
            asset,
            instance: InstanceId::new(),
            local_id: 42,
        };
        let err = registry.restore_entity(EntityId::new(), &info).unwrap_err();
        assert_eq!(err, TemplateError::InvalidLocalId { asset, local_id: 42 });
    }

    #[test]
    fn test_remove_last_member_drops_instance() {
        let assets = AssetManager::new();
        let mut registry = TemplateRegistry::new(assets.clone());
        let asset = registry.register_template(TemplateDefinition::new("Solo"));
        assets.register_resident(asset);

        let entity = EntityId::new();
        let info = RestoreInfo {
            asset,
            instance: InstanceId::new(),
            local_id: 0,
        };
        registry.restore_entity(entity, &info).unwrap();
        assert_eq!(registry.instance_count(), 1);

        assert!(registry.remove_entity(entity));
        assert!(!registry.remove_entity(entity));
        assert_eq!(registry.instance_count(), 0);
    }
}
