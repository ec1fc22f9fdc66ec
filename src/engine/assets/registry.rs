//! Instance registry: the single authority on which asset ids have a
//! scene-graph instance.
//!
//! An explicit bidirectional map (id -> entry, entity -> id) rather than
//! tags on scene nodes: reverse lookup after a raycast hit is a map read,
//! and the gizmo's attachment is a plain id that detaching clears. Each
//! entry also accounts for the mesh/material/scene handles created for
//! its instance, so teardown paths can be audited for leaks.

use bevy::prelude::*;
use std::collections::HashMap;

/// Load lifecycle of one instance. `Pending` is registered synchronously
/// before the async model load resolves, so a second event for the same
/// id is treated as "already exists" instead of starting a second load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Pending,
    Ready,
}

/// Registry entry for one live asset id.
#[derive(Debug)]
pub struct AssetEntry {
    pub root: Entity,
    pub phase: LoadPhase,
    pub scenes: Vec<Handle<Scene>>,
    pub meshes: Vec<Handle<Mesh>>,
    pub materials: Vec<Handle<StandardMaterial>>,
}

impl AssetEntry {
    fn pending(root: Entity) -> Self {
        Self {
            root,
            phase: LoadPhase::Pending,
            scenes: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
        }
    }

    fn resource_count(&self) -> usize {
        self.scenes.len() + self.meshes.len() + self.materials.len()
    }
}

#[derive(Resource, Default)]
pub struct AssetRegistry {
    by_id: HashMap<String, AssetEntry>,
    by_entity: HashMap<Entity, String>,
}

impl AssetRegistry {
    /// Register a placeholder for an id whose model load is in flight.
    /// Returns `false` (and changes nothing) if the id is already live.
    pub fn register_pending(&mut self, id: &str, root: Entity) -> bool {
        if self.by_id.contains_key(id) {
            return false;
        }
        self.by_id.insert(id.to_string(), AssetEntry::pending(root));
        self.by_entity.insert(root, id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn entry(&self, id: &str) -> Option<&AssetEntry> {
        self.by_id.get(id)
    }

    pub fn entry_mut(&mut self, id: &str) -> Option<&mut AssetEntry> {
        self.by_id.get_mut(id)
    }

    pub fn root_of(&self, id: &str) -> Option<Entity> {
        self.by_id.get(id).map(|e| e.root)
    }

    /// Reverse lookup for raycast hits.
    pub fn id_of(&self, entity: Entity) -> Option<&str> {
        self.by_entity.get(&entity).map(String::as_str)
    }

    /// Remove an id, returning its entry. Dropping the entry releases the
    /// retained asset handles.
    pub fn remove(&mut self, id: &str) -> Option<AssetEntry> {
        let entry = self.by_id.remove(id)?;
        self.by_entity.remove(&entry.root);
        Some(entry)
    }

    /// Drain every entry, for bulk clears.
    pub fn drain_all(&mut self) -> Vec<(String, AssetEntry)> {
        self.by_entity.clear();
        self.by_id.drain().collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetEntry)> {
        self.by_id.iter().map(|(id, e)| (id.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Total asset handles retained across live entries. Teardown tests
    /// assert this reaches zero after churn.
    pub fn retained_resource_count(&self) -> usize {
        self.by_id.values().map(AssetEntry::resource_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(index: u32) -> Entity {
        Entity::from_raw(index)
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = AssetRegistry::default();
        assert!(registry.register_pending("barrel-1", entity(1)));
        assert!(!registry.register_pending("barrel-1", entity(2)));
        assert_eq!(registry.root_of("barrel-1"), Some(entity(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_is_bidirectional() {
        let mut registry = AssetRegistry::default();
        registry.register_pending("crate-7", entity(3));
        assert_eq!(registry.id_of(entity(3)), Some("crate-7"));
        registry.remove("crate-7");
        assert_eq!(registry.id_of(entity(3)), None);
        assert!(!registry.contains("crate-7"));
    }

    #[test]
    fn retained_resources_drop_to_zero_after_removal() {
        let mut registry = AssetRegistry::default();
        registry.register_pending("a", entity(1));
        registry.register_pending("b", entity(2));
        for id in ["a", "b"] {
            let entry = registry.entry_mut(id).unwrap();
            entry.phase = LoadPhase::Ready;
            entry.meshes.push(Handle::default());
            entry.materials.push(Handle::default());
        }
        assert_eq!(registry.retained_resource_count(), 4);
        registry.remove("a");
        assert_eq!(registry.retained_resource_count(), 2);
        assert!(registry.drain_all().len() == 1);
        assert_eq!(registry.retained_resource_count(), 0);
        assert!(registry.is_empty());
    }
}
