use crate::entity::{Entity, EntityKey, EntityKind};
use dashmap::DashMap;
use tracing::info;

/// Last reported state of every entity the host told us about
#[derive(Default)]
pub struct EntityRegistry {
    /// Lock-free concurrent map for fast reads
    entities: DashMap<EntityKey, Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the entity's current state, returning what was stored before
    pub fn upsert(&self, entity: Entity) -> Option<Entity> {
        self.entities.insert(entity.key(), entity)
    }

    /// Replace the whole registry with a fresh enumeration from the host
    pub fn replace_all(&self, entities: Vec<Entity>) {
        self.entities.clear();
        for entity in entities {
            self.entities.insert(entity.key(), entity);
        }

        info!(
            devices = self.count(EntityKind::Device),
            variables = self.count(EntityKind::Variable),
            "Entity registry replaced"
        );
    }

    pub fn get(&self, key: &EntityKey) -> Option<Entity> {
        self.entities.get(key).map(|e| e.clone())
    }

    /// Get all entities
    pub fn all(&self) -> Vec<Entity> {
        self.entities.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn count(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|e| e.key().kind == kind).count()
    }
}
