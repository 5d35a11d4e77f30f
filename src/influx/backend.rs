use super::point::Point;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

/// Retention policy provisioned on every connect
#[derive(Clone, Debug, PartialEq)]
pub struct RetentionPolicy {
    pub name: String,
    /// InfluxQL duration literal (e.g. "730d")
    pub duration: String,
    pub replication: u32,
    pub default: bool,
}

impl RetentionPolicy {
    /// Two-year policy, replication factor one, set as default
    pub fn two_year() -> Self {
        Self {
            name: "two_year_policy".to_string(),
            duration: "730d".to_string(),
            replication: 1,
            default: true,
        }
    }
}

/// Why a write was not accepted
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WriteError {
    /// Backend rejected a field because its column already has another type
    #[error("field type conflict on \"{field}\": column already exists as type {expected}")]
    TypeConflict { field: String, expected: String },

    /// Backend answered with a non-success status for any other reason
    #[error("write rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Request never got a response
    #[error("transport error: {0}")]
    Transport(String),
}

/// Write-acceptance contract of the time-series backend.
///
/// Provisioning calls return `anyhow` errors since callers only log them;
/// writes return [`WriteError`] because the pipeline branches on type
/// conflicts.
#[async_trait]
pub trait TimeSeriesBackend: Send + Sync {
    /// Check that the backend answers at all
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Write one or more points into `database`
    async fn write_points(&self, database: &str, points: &[Point]) -> Result<(), WriteError>;

    /// Create a database (no-op when it already exists)
    async fn create_database(&self, database: &str) -> Result<()>;

    /// Drop a database
    async fn drop_database(&self, database: &str) -> Result<()>;

    /// Ensure `policy` exists on `database` with exactly these settings
    async fn ensure_retention_policy(&self, database: &str, policy: &RetentionPolicy) -> Result<()>;
}

/// Extract the offending field and the expected column type from a backend
/// type-conflict message.
///
/// Recognizes messages of the form
/// `field type conflict: input field "temp" on measurement "device_changes"
/// is type float, already exists as type integer dropped=1`.
///
/// # Examples
///
/// ```
/// use homeflux::influx::parse_type_conflict;
///
/// let msg = r#"partial write: field type conflict: input field "temp" on measurement "device_changes" is type float, already exists as type integer dropped=1"#;
/// assert_eq!(
///     parse_type_conflict(msg),
///     Some(("temp".to_string(), "integer".to_string()))
/// );
/// assert_eq!(parse_type_conflict("database not found"), None);
/// ```
pub fn parse_type_conflict(message: &str) -> Option<(String, String)> {
    if !message.contains("field type conflict") {
        return None;
    }

    let (_, after_field) = message.split_once("input field \"")?;
    let (field, rest) = after_field.split_once('"')?;

    let (_, after_type) = rest.split_once("already exists as type ")?;
    let expected: String = after_type
        .split_whitespace()
        .next()?
        .trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string();

    if field.is_empty() || expected.is_empty() {
        return None;
    }

    Some((field.to_string(), expected))
}
