// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entity-authoring API consumed by the hierarchy core.
//!
//! The editor talks to the live entity graph only through
//! [`EntityAuthoring`]. [`SceneWorld`] is the in-memory implementation used by
//! the editor shell and by tests.

use crate::ids::EntityId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by the entity-authoring API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// Entity does not exist
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// An entity with this identifier already exists
    #[error("Entity already exists: {0}")]
    EntityExists(EntityId),

    /// The requested parent does not exist
    #[error("Parent not found: {0}")]
    ParentNotFound(EntityId),

    /// Attaching would make an entity its own ancestor
    #[error("Attaching {child} under {parent} would create a cycle")]
    CycleDetected {
        /// Entity being attached
        child: EntityId,
        /// Requested parent
        parent: EntityId,
    },
}

/// Result type for world operations
pub type WorldResult<T> = std::result::Result<T, WorldError>;

/// Editor-only flags stored on the entity so snapshots carry them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorFlags {
    /// Visible in the editor viewport
    pub visible: bool,
    /// Can be picked in the editor viewport
    pub selectable: bool,
    /// Expanded in the hierarchy tree
    pub expanded: bool,
}

impl Default for EditorFlags {
    fn default() -> Self {
        Self {
            visible: true,
            selectable: true,
            expanded: false,
        }
    }
}

/// A component property value
///
/// Entity references are typed so that identifier remapping can find them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Reference to another entity
    Entity(EntityId),
    /// List of entity references
    Entities(Vec<EntityId>),
    /// Opaque component payload
    Json(#[serde(with = "json_text")] serde_json::Value),
}

impl PropertyValue {
    /// Rewrite every entity reference through `map`
    pub fn remap_entities(&mut self, map: &mut dyn FnMut(EntityId) -> EntityId) {
        match self {
            PropertyValue::Entity(id) => *id = map(*id),
            PropertyValue::Entities(ids) => {
                for id in ids.iter_mut() {
                    *id = map(*id);
                }
            }
            _ => {}
        }
    }
}

/// JSON payloads travel as text so that non-self-describing encodings work.
mod json_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &serde_json::Value, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<serde_json::Value, D::Error> {
        let text = String::deserialize(d)?;
        serde_json::from_str(&text).map_err(serde::de::Error::custom)
    }
}

/// Ordered property table of one entity
pub type PropertyMap = IndexMap<String, PropertyValue>;

/// The entity-authoring API
///
/// `parent == None` addresses the canvas root. A newly created entity is
/// loose: it exists but is not attached anywhere until [`attach`] is called.
///
/// [`attach`]: EntityAuthoring::attach
pub trait EntityAuthoring {
    /// Create a loose entity with the given identifier
    fn create_entity(&mut self, id: EntityId, name: &str) -> WorldResult<()>;

    /// Destroy an entity and all of its descendants, returning every destroyed id
    fn destroy_entity(&mut self, id: EntityId) -> WorldResult<Vec<EntityId>>;

    /// Check whether an entity exists
    fn contains(&self, id: EntityId) -> bool;

    /// Parent of an attached entity (`None` for roots and loose entities)
    fn parent_of(&self, id: EntityId) -> Option<EntityId>;

    /// Check whether an entity is attached to the canvas root or a parent
    fn is_attached(&self, id: EntityId) -> bool;

    /// Ordered children of a parent (`None` = canvas root)
    fn children_of(&self, parent: Option<EntityId>) -> Vec<EntityId>;

    /// Attach an entity under `parent` at `index` (clamped), detaching it first if needed
    fn attach(&mut self, id: EntityId, parent: Option<EntityId>, index: usize) -> WorldResult<()>;

    /// Detach an entity from its parent, leaving it loose
    fn detach(&mut self, id: EntityId) -> WorldResult<()>;

    /// Entity name
    fn name(&self, id: EntityId) -> Option<String>;

    /// Set the entity name
    fn set_name(&mut self, id: EntityId, name: &str) -> WorldResult<()>;

    /// Whether the entity is active
    fn is_active(&self, id: EntityId) -> Option<bool>;

    /// Activate or deactivate the entity
    fn set_active(&mut self, id: EntityId, active: bool) -> WorldResult<()>;

    /// Editor flags of the entity
    fn flags(&self, id: EntityId) -> Option<EditorFlags>;

    /// Replace the editor flags of the entity
    fn set_flags(&mut self, id: EntityId, flags: EditorFlags) -> WorldResult<()>;

    /// Component properties of the entity
    fn properties(&self, id: EntityId) -> Option<PropertyMap>;

    /// Replace all component properties of the entity
    fn set_properties(&mut self, id: EntityId, properties: PropertyMap) -> WorldResult<()>;

    /// Set one component property
    fn set_property(&mut self, id: EntityId, key: &str, value: PropertyValue) -> WorldResult<()>;
}

/// Entity data stored in the world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity name
    pub name: String,
    /// Whether the entity is active
    pub active: bool,
    /// Editor flags
    pub flags: EditorFlags,
    /// Component properties
    pub properties: PropertyMap,
    /// Parent entity (if attached under one)
    pub parent: Option<EntityId>,
    /// Child entities in order
    pub children: Vec<EntityId>,
}

impl EntityRecord {
    /// Create a new entity record with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            flags: EditorFlags::default(),
            properties: PropertyMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// In-memory entity graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneWorld {
    entities: IndexMap<EntityId, EntityRecord>,
    roots: Vec<EntityId>,
}

impl SceneWorld {
    /// Create a new empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entity record by ID
    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the world has no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn record_mut(&mut self, id: EntityId) -> WorldResult<&mut EntityRecord> {
        self.entities.get_mut(&id).ok_or(WorldError::EntityNotFound(id))
    }

    fn is_ancestor(&self, ancestor: EntityId, mut id: EntityId) -> bool {
        while let Some(parent) = self.entities.get(&id).and_then(|e| e.parent) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    fn collect_subtree(&self, id: EntityId, out: &mut Vec<EntityId>) {
        out.push(id);
        if let Some(record) = self.entities.get(&id) {
            for child in &record.children {
                self.collect_subtree(*child, out);
            }
        }
    }
}

impl EntityAuthoring for SceneWorld {
    fn create_entity(&mut self, id: EntityId, name: &str) -> WorldResult<()> {
        if self.entities.contains_key(&id) {
            return Err(WorldError::EntityExists(id));
        }
        self.entities.insert(id, EntityRecord::new(name));
        Ok(())
    }

    fn destroy_entity(&mut self, id: EntityId) -> WorldResult<Vec<EntityId>> {
        if !self.entities.contains_key(&id) {
            return Err(WorldError::EntityNotFound(id));
        }
        self.detach(id)?;

        let mut doomed = Vec::new();
        self.collect_subtree(id, &mut doomed);
        for entity in &doomed {
            self.entities.shift_remove(entity);
        }
        Ok(doomed)
    }

    fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        self.entities.get(&id).and_then(|e| e.parent)
    }

    fn is_attached(&self, id: EntityId) -> bool {
        self.parent_of(id).is_some() || self.roots.contains(&id)
    }

    fn children_of(&self, parent: Option<EntityId>) -> Vec<EntityId> {
        match parent {
            Some(parent) => self
                .entities
                .get(&parent)
                .map(|e| e.children.clone())
                .unwrap_or_default(),
            None => self.roots.clone(),
        }
    }

    fn attach(&mut self, id: EntityId, parent: Option<EntityId>, index: usize) -> WorldResult<()> {
        if !self.entities.contains_key(&id) {
            return Err(WorldError::EntityNotFound(id));
        }
        if let Some(parent) = parent {
            if !self.entities.contains_key(&parent) {
                return Err(WorldError::ParentNotFound(parent));
            }
            if parent == id || self.is_ancestor(id, parent) {
                return Err(WorldError::CycleDetected { child: id, parent });
            }
        }

        self.detach(id)?;

        let siblings = match parent {
            Some(parent) => &mut self.record_mut(parent)?.children,
            None => &mut self.roots,
        };
        let index = index.min(siblings.len());
        siblings.insert(index, id);
        self.record_mut(id)?.parent = parent;
        Ok(())
    }

    fn detach(&mut self, id: EntityId) -> WorldResult<()> {
        let parent = self.record_mut(id)?.parent.take();
        match parent {
            Some(parent) => {
                if let Some(record) = self.entities.get_mut(&parent) {
                    record.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        Ok(())
    }

    fn name(&self, id: EntityId) -> Option<String> {
        self.entities.get(&id).map(|e| e.name.clone())
    }

    fn set_name(&mut self, id: EntityId, name: &str) -> WorldResult<()> {
        self.record_mut(id)?.name = name.to_string();
        Ok(())
    }

    fn is_active(&self, id: EntityId) -> Option<bool> {
        self.entities.get(&id).map(|e| e.active)
    }

    fn set_active(&mut self, id: EntityId, active: bool) -> WorldResult<()> {
        self.record_mut(id)?.active = active;
        Ok(())
    }

    fn flags(&self, id: EntityId) -> Option<EditorFlags> {
        self.entities.get(&id).map(|e| e.flags)
    }

    fn set_flags(&mut self, id: EntityId, flags: EditorFlags) -> WorldResult<()> {
        self.record_mut(id)?.flags = flags;
        Ok(())
    }

    fn properties(&self, id: EntityId) -> Option<PropertyMap> {
        self.entities.get(&id).map(|e| e.properties.clone())
    }

    fn set_properties(&mut self, id: EntityId, properties: PropertyMap) -> WorldResult<()> {
        self.record_mut(id)?.properties = properties;
        Ok(())
    }

    fn set_property(&mut self, id: EntityId, key: &str, value: PropertyValue) -> WorldResult<()> {
        self.record_mut(id)?.properties.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(world: &mut SceneWorld, name: &str, parent: Option<EntityId>) -> EntityId {
        let id = EntityId::new();
        world.create_entity(id, name).unwrap();
        world.attach(id, parent, usize::MAX).unwrap();
        id
    }

    #[test]
    fn test_new_entity_is_loose() {
        let mut world = SceneWorld::new();
        let id = EntityId::new();
        world.create_entity(id, "Loose").unwrap();

        assert!(world.contains(id));
        assert!(!world.is_attached(id));
        assert!(world.children_of(None).is_empty());
    }

    #[test]
    fn test_attach_at_index() {
        let mut world = SceneWorld::new();
        let parent = spawn(&mut world, "Parent", None);
        let a = spawn(&mut world, "A", Some(parent));
        let b = spawn(&mut world, "B", Some(parent));

        let c = EntityId::new();
        world.create_entity(c, "C").unwrap();
        world.attach(c, Some(parent), 1).unwrap();

        assert_eq!(world.children_of(Some(parent)), vec![a, c, b]);
        assert_eq!(world.parent_of(c), Some(parent));
    }

    #[test]
    fn test_destroy_removes_subtree() {
        let mut world = SceneWorld::new();
        let root = spawn(&mut world, "Root", None);
        let child = spawn(&mut world, "Child", Some(root));
        let grandchild = spawn(&mut world, "Grandchild", Some(child));

        let destroyed = world.destroy_entity(child).unwrap();
        assert_eq!(destroyed, vec![child, grandchild]);
        assert!(world.children_of(Some(root)).is_empty());
        assert!(!world.contains(grandchild));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_attach_rejects_cycle() {
        let mut world = SceneWorld::new();
        let root = spawn(&mut world, "Root", None);
        let child = spawn(&mut world, "Child", Some(root));

        let err = world.attach(root, Some(child), 0).unwrap_err();
        assert_eq!(err, WorldError::CycleDetected { child: root, parent: child });
        assert_eq!(world.children_of(None), vec![root]);
    }

    #[test]
    fn test_property_remap() {
        let old = EntityId::new();
        let new = EntityId::new();
        let mut value = PropertyValue::Entities(vec![old, EntityId::new()]);
        value.remap_entities(&mut |id| if id == old { new } else { id });

        let PropertyValue::Entities(ids) = value else {
            panic!("variant changed");
        };
        assert_eq!(ids[0], new);
    }
}
