use crate::entity::EntityKey;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// When each entity was last written to the backend.
///
/// Shared by the change path and the heartbeat path. Entries are created
/// on first observation and never removed.
#[derive(Debug, Default)]
pub struct StalenessTracker {
    last_forwarded: DashMap<EntityKey, DateTime<Utc>>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &EntityKey) -> Option<DateTime<Utc>> {
        self.last_forwarded.get(key).map(|t| *t)
    }

    /// Record a first sighting; an existing entry wins
    pub fn seed(&self, key: EntityKey, at: DateTime<Utc>) {
        self.last_forwarded.entry(key).or_insert(at);
    }

    /// Record a write at `at`
    pub fn touch(&self, key: EntityKey, at: DateTime<Utc>) {
        self.last_forwarded.insert(key, at);
    }

    pub fn len(&self) -> usize {
        self.last_forwarded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_forwarded.is_empty()
    }
}
