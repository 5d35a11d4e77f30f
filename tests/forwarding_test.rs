// End-to-end forwarding scenarios against the in-memory backend

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{connected_forwarder, device, snapshot};
use homeflux::config::BridgeConfig;
use homeflux::entity::{EntityKind, INCLUDE_OVERRIDE_KEY, OVERRIDE_NAMESPACE};
use homeflux::filter::Policy;
use homeflux::influx::{FieldValue, MemoryBackend, RetentionPolicy};
use homeflux::pipeline::WriteOutcome;
use homeflux::scheduler::HeartbeatScheduler;
use homeflux::session::SessionManager;
use std::collections::HashMap;
use std::sync::Arc;

/// thermostat1 going from 70 to 72 produces exactly one write with temp=72.
#[tokio::test]
async fn test_thermostat_change_single_write() {
    let (forwarder, backend) = connected_forwarder(BridgeConfig::default()).await;

    let previous = snapshot(&[("temp", 70.into())]);
    let current = device("thermostat1", &[("temp", 72.into())]);

    let outcome = forwarder.on_device_changed(Some(previous), current).await;

    assert_eq!(outcome, Some(WriteOutcome::Sent));
    let points = backend.points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].measurement, "device_changes");
    assert_eq!(points[0].tags["name"], "thermostat1");
    assert_eq!(points[0].fields.len(), 1);
    assert_eq!(points[0].fields["temp"], FieldValue::Integer(72));
}

/// An unchanged sensor gets exactly one forced full write per wake after the first.
#[tokio::test]
async fn test_quiet_sensor_heartbeat_writes() {
    let mut config = BridgeConfig::default();
    config.scheduler.minimum_update_frequency_seconds = 60;
    let (forwarder, backend) = connected_forwarder(config).await;

    forwarder.replace_entities(vec![device(
        "sensor2",
        &[("temp", 19.5.into()), ("status", "ok".into())],
    )]);
    let scheduler = HeartbeatScheduler::new(forwarder.clone());
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

    let mut writes_per_wake = Vec::new();
    for wake in 0..3 {
        let before = backend.points().len();
        scheduler.run_cycle(start + Duration::seconds(60 * wake)).await;
        writes_per_wake.push(backend.points().len() - before);
    }

    assert_eq!(writes_per_wake, vec![0, 1, 1]);
    for point in backend.points() {
        assert_eq!(point.fields["temp"], FieldValue::Float(19.5));
        assert_eq!(point.fields["status"], FieldValue::String("ok".to_string()));
    }
}

/// A change between heartbeats pushes the next forced write back.
#[tokio::test]
async fn test_change_resets_heartbeat_timer() {
    let (forwarder, backend) = connected_forwarder(BridgeConfig::default()).await;
    forwarder.replace_entities(vec![device("lamp", &[("level", 1.into())])]);
    let scheduler = HeartbeatScheduler::new(forwarder.clone());

    let now = Utc::now();
    scheduler.run_cycle(now - Duration::seconds(120)).await;

    forwarder
        .on_device_changed(None, device("lamp", &[("level", 2.into())]))
        .await;
    assert_eq!(backend.points().len(), 1);

    // The change path touched the tracker just now
    let report = scheduler.run_cycle(now + Duration::seconds(10)).await;
    assert_eq!(report.forced, 0);
    assert_eq!(backend.points().len(), 1);
}

/// reset=true against a server without the database still ends ready.
#[tokio::test]
async fn test_reset_without_database_is_ready() {
    let backend = Arc::new(MemoryBackend::new());
    let sessions = SessionManager::new();

    assert!(sessions.connect_with(backend.clone(), "indigo", true).await);
    assert!(backend.has_database("indigo"));
    assert_eq!(backend.retention_policy("indigo"), Some(RetentionPolicy::two_year()));
}

/// Once a column type is learned, later points are coerced before the first attempt.
#[tokio::test]
async fn test_learned_type_applies_on_first_attempt() {
    let (forwarder, backend) = connected_forwarder(BridgeConfig::default()).await;

    // Column created as integer by an earlier write
    forwarder
        .on_device_changed(None, device("meter", &[("watts", 120.into())]))
        .await;
    // Host now reports the value as text
    forwarder
        .on_device_changed(None, device("meter", &[("watts", "130".into())]))
        .await;
    let attempts = backend.write_attempts();

    forwarder
        .on_device_changed(None, device("meter", &[("watts", "140".into())]))
        .await;

    assert_eq!(backend.write_attempts(), attempts + 1);
    let last = backend.points().pop().unwrap();
    assert_eq!(last.fields["watts"], FieldValue::Integer(140));
    assert_eq!(last.fields["watts.num"], FieldValue::Float(140.0));
}

/// Include mode with an `all` override on one device forwards all of its attributes.
#[tokio::test]
async fn test_include_mode_with_all_override() {
    let mut config = BridgeConfig::default();
    config.policy = Policy::include(&["onState"]);
    let (forwarder, backend) = connected_forwarder(config).await;

    let mut dimmer = device("dimmer", &[("onState", true.into()), ("brightness", 40.into())]);
    let mut props = HashMap::new();
    props.insert(INCLUDE_OVERRIDE_KEY.to_string(), "all".to_string());
    dimmer.global_props.insert(OVERRIDE_NAMESPACE.to_string(), props);

    let plain = device("switch", &[("onState", true.into()), ("brightness", 40.into())]);

    forwarder.on_device_changed(None, dimmer).await;
    forwarder.on_device_changed(None, plain).await;

    let points = backend.points();
    assert_eq!(points[0].fields.len(), 2);
    assert_eq!(points[1].fields.len(), 1);
    assert!(points[1].fields.contains_key("onState"));
}

/// Variables always use their fixed field set.
#[tokio::test]
async fn test_variable_change_point() {
    let (forwarder, backend) = connected_forwarder(BridgeConfig::default()).await;

    let mut variable = device("outside_temp", &[("value", "12.5".into())]);
    variable.kind = EntityKind::Variable;
    forwarder.on_variable_changed(None, variable).await;

    let points = backend.points_in("variable_changes");
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].tags["varname"], "outside_temp");
    assert_eq!(points[0].fields["value"], FieldValue::String("12.5".to_string()));
    assert_eq!(points[0].fields["value.num"], FieldValue::Float(12.5));
}
