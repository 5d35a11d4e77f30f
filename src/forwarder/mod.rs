use crate::config::BridgeConfig;
use crate::entity::{Entity, EntityKind, Snapshot};
use crate::filter::PointBuilder;
use crate::pipeline::{WriteOutcome, WritePipeline};
use crate::scheduler::StalenessTracker;
use crate::schema::TypeCache;
use crate::session::SessionManager;
use crate::state::EntityRegistry;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};


/// Snapshot of the forwarder's health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub ready: bool,
    pub database: Option<String>,
    pub learned_types: usize,
    pub tracked_entities: usize,
    pub registered_entities: usize,
}

/// Result of applying host preferences
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconfigured {
    pub reconnected: bool,
    pub ready: bool,
    /// Preferences that could not be applied
    pub errors: Vec<String>,
}

/// All process state: settings, session, learned types, staleness and the
/// entity registry
pub struct Forwarder {
    settings: RwLock<Arc<BridgeConfig>>,
    sessions: Arc<SessionManager>,
    cache: Arc<TypeCache>,
    tracker: StalenessTracker,
    registry: EntityRegistry,
    pipeline: WritePipeline,
}

impl Forwarder {
    /// Create a forwarder with no session yet
    pub fn new(config: BridgeConfig) -> Self {
        let sessions = Arc::new(SessionManager::new());
        let cache = Arc::new(TypeCache::new());
        let pipeline = WritePipeline::new(sessions.clone(), cache.clone());

        Self {
            settings: RwLock::new(Arc::new(config)),
            sessions,
            cache,
            tracker: StalenessTracker::new(),
            registry: EntityRegistry::new(),
            pipeline,
        }
    }

    /// Current settings snapshot
    pub async fn settings(&self) -> Arc<BridgeConfig> {
        self.settings.read().await.clone()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    pub fn tracker(&self) -> &StalenessTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Connect with the configured backend settings
    pub async fn connect(&self) -> bool {
        let settings = self.settings().await;
        self.sessions.connect(&settings.influx).await
    }

    /// A device changed on the host.
    ///
    /// Returns `None` when nothing policy-visible changed.
    pub async fn on_device_changed(
        &self,
        previous: Option<Snapshot>,
        mut current: Entity,
    ) -> Option<WriteOutcome> {
        current.kind = EntityKind::Device;
        self.on_changed(previous, current).await
    }

    /// A variable changed on the host
    pub async fn on_variable_changed(
        &self,
        previous: Option<Snapshot>,
        mut current: Entity,
    ) -> Option<WriteOutcome> {
        current.kind = EntityKind::Variable;
        self.on_changed(previous, current).await
    }

    async fn on_changed(&self, previous: Option<Snapshot>, current: Entity) -> Option<WriteOutcome> {
        let stored = self.registry.upsert(current.clone());
        // Without a previous snapshot from the host, diff against what we saw last
        let previous = previous
            .or_else(|| stored.map(|e| e.attributes))
            .unwrap_or_default();

        let outcome = self.forward(&current, &previous, false).await;
        if outcome == Some(WriteOutcome::Sent) {
            self.tracker.touch(current.key(), Utc::now());
        }

        debug!(entity = %current.key(), outcome = ?outcome, "Processed change");
        outcome
    }

    /// Build the point for `entity` and write it.
    ///
    /// Returns `None` when there is nothing to send.
    pub async fn forward(
        &self,
        entity: &Entity,
        previous: &Snapshot,
        force_full: bool,
    ) -> Option<WriteOutcome> {
        let settings = self.settings().await;
        let builder = PointBuilder::new(&settings.policy, &self.cache);

        let point = match entity.kind {
            EntityKind::Device => builder.device(previous, entity, force_full),
            EntityKind::Variable => builder.variable(previous, entity, force_full),
        }?;

        Some(self.pipeline.write(point, settings.debug).await)
    }

    /// Replace the registry with a full enumeration from the host
    pub fn replace_entities(&self, entities: Vec<Entity>) {
        self.registry.replace_all(entities);
    }

    /// Apply a host preference map, reconnecting when the connection
    /// settings changed or a reset was requested
    pub async fn reconfigure(&self, prefs: &HashMap<String, Value>) -> Reconfigured {
        let (next, errors, reconnect) = {
            let mut settings = self.settings.write().await;
            let mut next = (**settings).clone();
            let errors = next.apply_prefs(prefs);
            let reconnect =
                next.influx.connection_differs(&settings.influx) || next.influx.reset;

            let next = Arc::new(next);
            *settings = next.clone();
            (next, errors, reconnect)
        };

        let ready = if reconnect {
            info!(database = %next.influx.database, reset = next.influx.reset, "Connection settings changed, reconnecting");
            self.sessions.connect(&next.influx).await
        } else {
            self.sessions.is_ready().await
        };

        Reconfigured {
            reconnected: reconnect,
            ready,
            errors: errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub async fn status(&self) -> Status {
        Status {
            ready: self.sessions.is_ready().await,
            database: self.sessions.database().await,
            learned_types: self.cache.len(),
            tracked_entities: self.tracker.len(),
            registered_entities: self.registry.len(),
        }
    }
}
