use super::coercion::{coerce, CoercionKind};
use crate::influx::FieldValue;
use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Field types learned from backend rejections.
///
/// Entries are only ever added or overwritten, never removed; the cache
/// lives as long as the process.
#[derive(Debug, Default)]
pub struct TypeCache {
    kinds: DashMap<String, CoercionKind>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the column type the backend demanded for `field`
    pub fn learn(&self, field: &str, kind: CoercionKind) {
        let previous = self.kinds.insert(field.to_string(), kind);
        if previous != Some(kind) {
            info!(field = %field, kind = %kind, "Learned field type");
        }
    }

    pub fn get(&self, field: &str) -> Option<CoercionKind> {
        self.kinds.get(field).map(|k| *k)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Cast `value` to the learned type of `field`, if one is known.
    ///
    /// A value that does not convert is returned unchanged; the write
    /// pipeline deals with a second rejection.
    pub fn apply(&self, field: &str, value: FieldValue) -> FieldValue {
        let Some(kind) = self.get(field) else {
            return value;
        };

        match coerce(&value, kind) {
            Ok(coerced) => coerced,
            Err(e) => {
                debug!(field = %field, error = %e, "Learned type does not fit value, sending as is");
                value
            }
        }
    }

    /// Apply learned types to every field of a field set
    pub fn apply_all(&self, fields: BTreeMap<String, FieldValue>) -> BTreeMap<String, FieldValue> {
        fields
            .into_iter()
            .map(|(name, value)| {
                let value = self.apply(&name, value);
                (name, value)
            })
            .collect()
    }
}
