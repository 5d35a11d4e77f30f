use crate::influx::FieldValue;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Target primitive type a field must be cast to after a schema rejection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionKind {
    Integer,
    Real,
    Text,
    Boolean,
}

impl CoercionKind {
    /// Map a backend column type name to a coercion kind.
    ///
    /// Returns `None` for column types no cast exists for.
    pub fn from_backend_type(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "integer" | "int" => Some(CoercionKind::Integer),
            "float" | "real" => Some(CoercionKind::Real),
            "string" | "str" | "text" => Some(CoercionKind::Text),
            "boolean" | "bool" => Some(CoercionKind::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for CoercionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoercionKind::Integer => "integer",
            CoercionKind::Real => "float",
            CoercionKind::Text => "string",
            CoercionKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A value could not be cast to the requested kind
#[derive(Debug, Error, Clone, PartialEq)]
#[error("cannot convert {value:?} to {kind}")]
pub struct CoercionError {
    pub value: String,
    pub kind: CoercionKind,
}

/// Cast a field value to `kind`.
///
/// Text input is trimmed before parsing. Reals only become integers when
/// they carry no fractional part, so no precision is silently lost.
pub fn coerce(value: &FieldValue, kind: CoercionKind) -> Result<FieldValue, CoercionError> {
    let fail = || CoercionError {
        value: value.to_string(),
        kind,
    };

    match kind {
        CoercionKind::Text => Ok(FieldValue::String(value.to_string())),
        CoercionKind::Integer => match value {
            FieldValue::Integer(i) => Ok(FieldValue::Integer(*i)),
            FieldValue::Float(f) => whole_number(*f).map(FieldValue::Integer).ok_or_else(fail),
            FieldValue::Boolean(b) => Ok(FieldValue::Integer(i64::from(*b))),
            FieldValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
                    .map(FieldValue::Integer)
                    .ok_or_else(fail)
            }
        },
        CoercionKind::Real => match value {
            FieldValue::Integer(i) => Ok(FieldValue::Float(*i as f64)),
            FieldValue::Float(f) => Ok(FieldValue::Float(*f)),
            FieldValue::Boolean(b) => Ok(FieldValue::Float(if *b { 1.0 } else { 0.0 })),
            FieldValue::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(FieldValue::Float)
                .ok_or_else(fail),
        },
        CoercionKind::Boolean => match value {
            FieldValue::Boolean(b) => Ok(FieldValue::Boolean(*b)),
            FieldValue::Integer(0) => Ok(FieldValue::Boolean(false)),
            FieldValue::Integer(1) => Ok(FieldValue::Boolean(true)),
            FieldValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "on" | "yes" | "1" => Ok(FieldValue::Boolean(true)),
                "false" | "f" | "off" | "no" | "0" => Ok(FieldValue::Boolean(false)),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        },
    }
}

fn whole_number(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
