use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Measurement for device change points
pub const DEVICE_MEASUREMENT: &str = "device_changes";

/// Measurement for variable change points
pub const VARIABLE_MEASUREMENT: &str = "variable_changes";

/// Typed field value as accepted by the backend
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl FieldValue {
    /// Backend column type name for this value
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::String(_) => "string",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::String(s) => f.write_str(s),
        }
    }
}

/// One time-series write record.
///
/// Serializes to the wire shape
/// `{measurement, tags: {string: string}, fields: {string: int|float|bool|string}}`,
/// which is what debug logging prints.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}
