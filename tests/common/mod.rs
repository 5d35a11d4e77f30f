// Shared helpers for integration tests

use homeflux::config::BridgeConfig;
use homeflux::entity::{AttrValue, Entity, EntityKind, Snapshot};
use homeflux::forwarder::Forwarder;
use homeflux::influx::MemoryBackend;
use std::sync::Arc;

#[allow(dead_code)]
pub fn snapshot(pairs: &[(&str, AttrValue)]) -> Snapshot {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[allow(dead_code)]
pub fn device(name: &str, pairs: &[(&str, AttrValue)]) -> Entity {
    Entity::new(EntityKind::Device, name, snapshot(pairs))
}

/// Forwarder connected to a fresh in-memory backend
#[allow(dead_code)]
pub async fn connected_forwarder(config: BridgeConfig) -> (Arc<Forwarder>, Arc<MemoryBackend>) {
    let database = config.influx.database.clone();
    let forwarder = Arc::new(Forwarder::new(config));
    let backend = Arc::new(MemoryBackend::new());
    assert!(
        forwarder
            .sessions()
            .connect_with(backend.clone(), &database, false)
            .await
    );
    (forwarder, backend)
}
