use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;


/// Metadata namespace the host uses for per-entity forwarding overrides
pub const OVERRIDE_NAMESPACE: &str = "com.indigodomo.indigoserver";

/// Metadata key holding the per-entity include list
pub const INCLUDE_OVERRIDE_KEY: &str = "influxIncStates";

/// Metadata key holding the per-entity exclude list
pub const EXCLUDE_OVERRIDE_KEY: &str = "influxExclStates";

/// A single observed attribute value.
///
/// Deserialization tries the variants in declaration order, so JSON `72`
/// becomes `Integer`, `72.5` becomes `Real`, and an RFC 3339 string becomes
/// `Timestamp` before falling back to `Text`. Either way the string is kept
/// exactly as the host sent it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Timestamp(HostTimestamp),
    Text(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Boolean(b) => write!(f, "{}", b),
            AttrValue::Integer(i) => write!(f, "{}", i),
            AttrValue::Real(r) => write!(f, "{}", r),
            AttrValue::Timestamp(ts) => f.write_str(ts.as_str()),
            AttrValue::Text(s) => f.write_str(s),
        }
    }
}

/// An RFC 3339 timestamp string from the host, parsed but kept verbatim
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostTimestamp {
    at: DateTime<Utc>,
    raw: String,
}

impl HostTimestamp {
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// The text exactly as received
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for HostTimestamp {
    type Error = chrono::ParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let at = DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc);
        Ok(Self { at, raw })
    }
}

impl From<HostTimestamp> for String {
    fn from(ts: HostTimestamp) -> Self {
        ts.raw
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Integer(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Integer(v.into())
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Real(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Boolean(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

/// Observable state of an entity at one instant (attribute name -> value)
pub type Snapshot = BTreeMap<String, AttrValue>;

/// What kind of host object an entity is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Device,
    Variable,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Device => f.write_str("device"),
            EntityKind::Variable => f.write_str("variable"),
        }
    }
}

/// Identity of an entity across snapshots
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub name: String,
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// A device or variable as reported by the host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub kind: EntityKind,

    /// Host-assigned numeric identifier
    #[serde(default)]
    pub id: i64,

    /// Display name (unique per kind on the host)
    pub name: String,

    /// Folder the entity lives in (0 = top level)
    #[serde(default)]
    pub folder_id: i64,

    /// Resolved folder name, when the host knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,

    /// Last time the host saw this entity change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<DateTime<Utc>>,

    /// Namespaced metadata attached by the host (namespace -> key -> value)
    #[serde(default)]
    pub global_props: HashMap<String, HashMap<String, String>>,

    /// Current attribute values
    #[serde(default)]
    pub attributes: Snapshot,
}

impl Entity {
    /// Create an entity with no metadata
    pub fn new(kind: EntityKind, name: impl Into<String>, attributes: Snapshot) -> Self {
        Self {
            kind,
            id: 0,
            name: name.into(),
            folder_id: 0,
            folder_name: None,
            last_changed: None,
            global_props: HashMap::new(),
            attributes,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey {
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// Look up a metadata value in the override namespace
    pub fn override_prop(&self, key: &str) -> Option<&str> {
        self.global_props
            .get(OVERRIDE_NAMESPACE)
            .and_then(|props| props.get(key))
            .map(|s| s.as_str())
    }

    /// Per-entity include list (empty when none is attached)
    pub fn include_override(&self) -> Vec<String> {
        self.override_prop(INCLUDE_OVERRIDE_KEY)
            .map(parse_name_list)
            .unwrap_or_default()
    }

    /// Per-entity exclude list (empty when none is attached)
    pub fn exclude_override(&self) -> Vec<String> {
        self.override_prop(EXCLUDE_OVERRIDE_KEY)
            .map(parse_name_list)
            .unwrap_or_default()
    }
}

/// Parse a comma-separated attribute name list
///
/// All whitespace is ignored and empty entries are dropped, so
/// `" temp, humidity ,,"` yields `["temp", "humidity"]`.
///
/// # Examples
///
/// ```
/// use homeflux::entity::parse_name_list;
///
/// assert_eq!(parse_name_list("onState, brightness"), vec!["onState", "brightness"]);
/// assert!(parse_name_list("  ").is_empty());
/// ```
pub fn parse_name_list(raw: &str) -> Vec<String> {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .split(',')
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .collect()
}
