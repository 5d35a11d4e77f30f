use super::*;
use crate::entity::{AttrValue, Entity, EntityKind, Snapshot, INCLUDE_OVERRIDE_KEY, EXCLUDE_OVERRIDE_KEY, OVERRIDE_NAMESPACE};
use crate::influx::FieldValue;
use crate::schema::{CoercionKind, TypeCache};
use std::collections::HashMap;

fn snapshot(pairs: &[(&str, AttrValue)]) -> Snapshot {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn device(name: &str, attributes: Snapshot) -> Entity {
    Entity::new(EntityKind::Device, name, attributes)
}

fn with_override(mut entity: Entity, key: &str, list: &str) -> Entity {
    let mut props = HashMap::new();
    props.insert(key.to_string(), list.to_string());
    entity
        .global_props
        .insert(OVERRIDE_NAMESPACE.to_string(), props);
    entity
}

// --- changed_attributes ---

#[test]
fn test_changed_attributes_detects_new_and_modified() {
    let previous = snapshot(&[("temp", 70.into()), ("mode", "heat".into())]);
    let current = snapshot(&[
        ("temp", 72.into()),
        ("mode", "heat".into()),
        ("humidity", 40.into()),
    ]);

    let mut changed = changed_attributes(&previous, &current, false);
    changed.sort();
    assert_eq!(changed, vec!["humidity", "temp"]);
}

#[test]
fn test_changed_attributes_type_change_counts() {
    let previous = snapshot(&[("level", 5.into())]);
    let current = snapshot(&[("level", 5.0.into())]);
    assert_eq!(changed_attributes(&previous, &current, false), vec!["level"]);
}

#[test]
fn test_changed_attributes_force_full_returns_all() {
    let state = snapshot(&[("a", 1.into()), ("b", true.into())]);
    assert_eq!(changed_attributes(&state, &state, true), vec!["a", "b"]);
}

// --- diff ---

#[test]
fn test_no_visible_change_is_nothing_to_send() {
    let state = snapshot(&[("temp", 70.into()), ("mode", "heat".into())]);
    assert!(diff(&state, &state, &Policy::default(), &[], false).is_none());

    // Only an excluded attribute changed
    let previous = snapshot(&[("temp", 70.into()), ("lastPing", 1.into())]);
    let current = snapshot(&[("temp", 70.into()), ("lastPing", 2.into())]);
    let policy = Policy::exclude(&["lastPing"]);
    assert!(diff(&previous, &current, &policy, &[], false).is_none());
}

#[test]
fn test_excluded_attribute_never_in_fields() {
    let previous = snapshot(&[("temp", 70.into()), ("rssi", (-60).into())]);
    let current = snapshot(&[("temp", 72.into()), ("rssi", (-61).into())]);

    let policy = Policy::exclude(&["rssi"]);
    let fields = diff(&previous, &current, &policy, &[], false).unwrap();
    assert!(!fields.contains_key("rssi"));
    assert_eq!(fields["temp"], FieldValue::Integer(72));

    // Same attribute excluded only by the entity override
    let fields = diff(&previous, &current, &Policy::exclude(&[]), &["rssi".to_string()], false).unwrap();
    assert!(!fields.contains_key("rssi"));
}

#[test]
fn test_include_mode_keeps_union_of_global_and_override() {
    let previous = Snapshot::new();
    let current = snapshot(&[
        ("temp", 72.into()),
        ("humidity", 40.into()),
        ("battery", 90.into()),
    ]);

    let policy = Policy::include(&["temp"]);
    let fields = diff(&previous, &current, &policy, &["humidity".to_string()], false).unwrap();

    let keys: Vec<&String> = fields.keys().collect();
    assert_eq!(keys, vec!["humidity", "temp"]);
}

#[test]
fn test_include_mode_all_override_forwards_everything() {
    let previous = Snapshot::new();
    let current = snapshot(&[("temp", 72.into()), ("battery", 90.into())]);

    let policy = Policy::include(&["somethingElse"]);
    let fields = diff(&previous, &current, &policy, &["all".to_string()], false).unwrap();
    assert_eq!(fields.len(), 2);
}

#[test]
fn test_exclude_mode_all_override_forwards_nothing() {
    let previous = Snapshot::new();
    let current = snapshot(&[("temp", 72.into()), ("battery", 90.into())]);

    let result = diff(&previous, &current, &Policy::exclude(&[]), &["all".to_string()], true);
    assert!(result.is_none());
}

#[test]
fn test_numeric_text_gets_companion_field() {
    let previous = Snapshot::new();
    let current = snapshot(&[("displayState", " 21.5 ".into()), ("mode", "auto".into())]);

    let fields = diff(&previous, &current, &Policy::default(), &[], false).unwrap();
    assert_eq!(fields["displayState"], FieldValue::String(" 21.5 ".to_string()));
    assert_eq!(fields["displayState.num"], FieldValue::Float(21.5));
    assert!(!fields.contains_key("mode.num"));
}

#[test]
fn test_natural_types_preserved() {
    let current = snapshot(&[
        ("on", true.into()),
        ("level", 3.into()),
        ("temp", 21.25.into()),
    ]);
    let fields = diff(&Snapshot::new(), &current, &Policy::default(), &[], false).unwrap();
    assert_eq!(fields["on"], FieldValue::Boolean(true));
    assert_eq!(fields["level"], FieldValue::Integer(3));
    assert_eq!(fields["temp"], FieldValue::Float(21.25));
}

#[test]
fn test_timestamp_text_forwarded_unchanged() {
    let current: Snapshot =
        serde_json::from_value(serde_json::json!({ "lastSeen": "2024-01-01T00:00:00Z" })).unwrap();
    assert!(matches!(current["lastSeen"], AttrValue::Timestamp(_)));

    let fields = diff(&Snapshot::new(), &current, &Policy::default(), &[], false).unwrap();
    assert_eq!(fields["lastSeen"], FieldValue::String("2024-01-01T00:00:00Z".to_string()));
}

#[test]
fn test_numeric_projection() {
    assert_eq!(numeric_projection("42"), Some(42.0));
    assert_eq!(numeric_projection("-0.5"), Some(-0.5));
    assert_eq!(numeric_projection("inf"), None);
    assert_eq!(numeric_projection("on"), None);
}

// --- policy ---

#[test]
fn test_policy_mode_parsing() {
    assert_eq!("include".parse::<PolicyMode>(), Ok(PolicyMode::Include));
    assert_eq!(" Exclude ".parse::<PolicyMode>(), Ok(PolicyMode::Exclude));
    assert!("both".parse::<PolicyMode>().is_err());
}

#[test]
fn test_selection_variants() {
    let policy = Policy::include(&["temp"]);
    assert!(matches!(policy.selection(&[]), Selection::Only(_)));

    let policy = Policy::exclude(&["temp"]);
    let selection = policy.selection(&[]);
    assert!(!selection.admits("temp"));
    assert!(selection.admits("humidity"));
}

// --- PointBuilder ---

#[test]
fn test_device_point_tags_and_measurement() {
    let cache = TypeCache::new();
    let policy = Policy::default();
    let builder = PointBuilder::new(&policy, &cache);

    let mut current = device("thermostat1", snapshot(&[("temp", 72.into())]));
    current.folder_id = 12;
    current.folder_name = Some("Upstairs".to_string());

    let point = builder
        .device(&snapshot(&[("temp", 70.into())]), &current, false)
        .unwrap();

    assert_eq!(point.measurement, "device_changes");
    assert_eq!(point.tags["name"], "thermostat1");
    assert_eq!(point.tags["folderId"], "12");
    assert_eq!(point.tags["folder"], "Upstairs");
    assert_eq!(point.fields["temp"], FieldValue::Integer(72));
}

#[test]
fn test_device_point_without_folder_has_no_folder_tag() {
    let cache = TypeCache::new();
    let policy = Policy::default();
    let builder = PointBuilder::new(&policy, &cache);

    let mut current = device("lamp", snapshot(&[("onState", true.into())]));
    current.folder_name = Some("ignored".to_string());

    let point = builder.device(&Snapshot::new(), &current, false).unwrap();
    assert_eq!(point.tags["folderId"], "0");
    assert!(!point.tags.contains_key("folder"));
}

#[test]
fn test_device_override_from_entity_metadata() {
    let cache = TypeCache::new();
    let policy = Policy::include(&["temp"]);
    let builder = PointBuilder::new(&policy, &cache);

    let current = with_override(
        device("lamp", snapshot(&[("temp", 1.into()), ("brightness", 50.into())])),
        INCLUDE_OVERRIDE_KEY,
        "brightness",
    );
    let point = builder.device(&Snapshot::new(), &current, false).unwrap();
    assert_eq!(point.fields.len(), 2);

    // Exclude-mode override key is ignored in include mode
    let current = with_override(
        device("lamp", snapshot(&[("temp", 1.into()), ("brightness", 50.into())])),
        EXCLUDE_OVERRIDE_KEY,
        "temp",
    );
    let point = builder.device(&Snapshot::new(), &current, false).unwrap();
    assert_eq!(point.fields.len(), 1);
    assert!(point.fields.contains_key("temp"));
}

#[test]
fn test_learned_type_applied_before_first_write() {
    let cache = TypeCache::new();
    cache.learn("temp", CoercionKind::Integer);
    let policy = Policy::default();
    let builder = PointBuilder::new(&policy, &cache);

    let current = device("thermostat1", snapshot(&[("temp", "72".into())]));
    let point = builder.device(&Snapshot::new(), &current, false).unwrap();

    assert_eq!(point.fields["temp"], FieldValue::Integer(72));
    // Companion keeps its own (unlearned) float type
    assert_eq!(point.fields["temp.num"], FieldValue::Float(72.0));
}

#[test]
fn test_variable_point_fields() {
    let cache = TypeCache::new();
    let policy = Policy::include(&["nothing"]);
    let builder = PointBuilder::new(&policy, &cache);

    let current = Entity::new(
        EntityKind::Variable,
        "outside_temp",
        snapshot(&[("value", "18".into())]),
    );
    let point = builder
        .variable(&snapshot(&[("value", "17".into())]), &current, false)
        .unwrap();

    assert_eq!(point.measurement, "variable_changes");
    assert_eq!(point.tags["varname"], "outside_temp");
    assert_eq!(point.fields["name"], FieldValue::String("outside_temp".to_string()));
    assert_eq!(point.fields["value"], FieldValue::String("18".to_string()));
    assert_eq!(point.fields["value.num"], FieldValue::Float(18.0));
}

#[test]
fn test_variable_unchanged_unless_forced() {
    let cache = TypeCache::new();
    let policy = Policy::default();
    let builder = PointBuilder::new(&policy, &cache);

    let state = snapshot(&[("value", "away".into())]);
    let current = Entity::new(EntityKind::Variable, "house_mode", state.clone());

    assert!(builder.variable(&state, &current, false).is_none());
    let point = builder.variable(&state, &current, true).unwrap();
    assert!(!point.fields.contains_key("value.num"));
}
