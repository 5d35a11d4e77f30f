use super::policy::{Policy, PolicyMode};
use crate::entity::{AttrValue, Entity, Snapshot};
use crate::influx::{FieldValue, Point, DEVICE_MEASUREMENT, VARIABLE_MEASUREMENT};
use crate::schema::TypeCache;
use std::collections::BTreeMap;

/// Suffix of the numeric companion field emitted for numeric text
pub const NUMERIC_SUFFIX: &str = ".num";

/// Attribute carrying a variable's value
const VARIABLE_VALUE: &str = "value";

/// Names of attributes in `current` that differ from `previous`.
///
/// An attribute missing from `previous` counts as changed. With
/// `force_full` every attribute of `current` is returned. Attributes that
/// disappeared have no value to send and are ignored.
pub fn changed_attributes<'a>(
    previous: &Snapshot,
    current: &'a Snapshot,
    force_full: bool,
) -> Vec<&'a str> {
    current
        .iter()
        .filter(|(name, value)| force_full || previous.get(name.as_str()) != Some(*value))
        .map(|(name, _)| name.as_str())
        .collect()
}

/// Parse numeric text into a float, if it is a finite number
pub fn numeric_projection(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Convert an attribute to its natural field type
fn to_field(value: &AttrValue) -> FieldValue {
    match value {
        AttrValue::Integer(i) => FieldValue::Integer(*i),
        AttrValue::Real(r) => FieldValue::Float(*r),
        AttrValue::Boolean(b) => FieldValue::Boolean(*b),
        AttrValue::Text(s) => FieldValue::String(s.clone()),
        AttrValue::Timestamp(ts) => FieldValue::String(ts.as_str().to_string()),
    }
}

/// Insert an attribute and, for numeric text, its `.num` companion
fn insert_with_projection(fields: &mut BTreeMap<String, FieldValue>, name: &str, value: &AttrValue) {
    fields.insert(name.to_string(), to_field(value));
    if let AttrValue::Text(text) = value {
        if let Some(number) = numeric_projection(text) {
            fields
                .entry(format!("{}{}", name, NUMERIC_SUFFIX))
                .or_insert(FieldValue::Float(number));
        }
    }
}

/// Compute the policy-visible field set that changed between two snapshots.
///
/// Returns `None` when nothing policy-visible changed. Values keep their
/// natural types; learned coercions are applied by [`PointBuilder`].
pub fn diff(
    previous: &Snapshot,
    current: &Snapshot,
    policy: &Policy,
    overrides: &[String],
    force_full: bool,
) -> Option<BTreeMap<String, FieldValue>> {
    let selection = policy.selection(overrides);

    let mut fields = BTreeMap::new();
    for name in changed_attributes(previous, current, force_full) {
        if !selection.admits(name) {
            continue;
        }
        insert_with_projection(&mut fields, name, &current[name]);
    }

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

/// Builds points for change events, consulting the learned type cache
/// before any value leaves the process.
pub struct PointBuilder<'a> {
    policy: &'a Policy,
    cache: &'a TypeCache,
}

impl<'a> PointBuilder<'a> {
    pub fn new(policy: &'a Policy, cache: &'a TypeCache) -> Self {
        Self { policy, cache }
    }

    /// Point for a device change, or `None` when nothing is to be sent
    pub fn device(&self, previous: &Snapshot, current: &Entity, force_full: bool) -> Option<Point> {
        let overrides = match self.policy.mode {
            PolicyMode::Include => current.include_override(),
            PolicyMode::Exclude => current.exclude_override(),
        };

        let fields = diff(
            previous,
            &current.attributes,
            self.policy,
            &overrides,
            force_full,
        )?;

        let mut point = Point::new(DEVICE_MEASUREMENT)
            .tag("name", current.name.clone())
            .tag("folderId", current.folder_id.to_string());
        if current.folder_id != 0 {
            if let Some(folder) = &current.folder_name {
                point = point.tag("folder", folder.clone());
            }
        }
        point.fields = self.cache.apply_all(fields);

        Some(point)
    }

    /// Point for a variable change.
    ///
    /// Variables carry a fixed field set (`name`, `value`, `value.num`) and
    /// bypass the attribute policy. They are sent when the value changed
    /// or when the write is forced.
    pub fn variable(&self, previous: &Snapshot, current: &Entity, force_full: bool) -> Option<Point> {
        let value = current.attributes.get(VARIABLE_VALUE)?;
        if !force_full && previous.get(VARIABLE_VALUE) == Some(value) {
            return None;
        }

        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), FieldValue::String(current.name.clone()));
        insert_with_projection(&mut fields, VARIABLE_VALUE, value);

        let mut point = Point::new(VARIABLE_MEASUREMENT).tag("varname", current.name.clone());
        point.fields = self.cache.apply_all(fields);

        Some(point)
    }
}
