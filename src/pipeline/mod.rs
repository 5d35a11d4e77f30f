use crate::influx::{Point, WriteError};
use crate::schema::{coerce, CoercionKind, TypeCache};
use crate::session::SessionManager;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};


/// Upper bound on write attempts for a single point
pub const MAX_WRITE_ATTEMPTS: usize = 30;

/// How a write ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Backend accepted the point
    Sent,
    /// Point abandoned (unrecoverable rejection, no fields left, or attempt
    /// budget spent)
    GaveUp,
    /// No ready session; nothing was attempted
    NotReady,
}

impl WriteOutcome {
    pub fn is_sent(self) -> bool {
        self == WriteOutcome::Sent
    }
}

/// Writes points through the live session, learning column types from
/// type-conflict rejections and retrying with coerced values
pub struct WritePipeline {
    sessions: Arc<SessionManager>,
    cache: Arc<TypeCache>,
}

impl WritePipeline {
    pub fn new(sessions: Arc<SessionManager>, cache: Arc<TypeCache>) -> Self {
        Self { sessions, cache }
    }

    /// Write one point.
    ///
    /// With `verbose` set, the outgoing point is logged as JSON and
    /// coercion failures are logged at info level.
    pub async fn write(&self, mut point: Point, verbose: bool) -> WriteOutcome {
        if verbose {
            match serde_json::to_string(&point) {
                Ok(json) => info!(point = %json, "Writing point"),
                Err(e) => warn!(error = %e, "Failed to serialize point for logging"),
            }
        }

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            // Readiness is rechecked every attempt; a reconnect may retire the session
            let Some(session) = self.sessions.ready_session().await else {
                debug!(measurement = %point.measurement, "No ready session, skipping write");
                return WriteOutcome::NotReady;
            };

            let result = session
                .backend()
                .write_points(session.database(), std::slice::from_ref(&point))
                .await;

            match result {
                Ok(()) => {
                    debug!(
                        measurement = %point.measurement,
                        fields = point.fields.len(),
                        attempt = attempt,
                        "Point written"
                    );
                    return WriteOutcome::Sent;
                }
                Err(WriteError::TypeConflict { field, expected }) => {
                    if !self.resolve_conflict(&mut point, &field, &expected, verbose) {
                        return WriteOutcome::GaveUp;
                    }
                }
                Err(e) => {
                    error!(
                        measurement = %point.measurement,
                        tags = ?point.tags,
                        fields = ?point.fields,
                        error = %e,
                        "Write failed, abandoning point"
                    );
                    return WriteOutcome::GaveUp;
                }
            }
        }

        debug!(
            measurement = %point.measurement,
            attempts = MAX_WRITE_ATTEMPTS,
            "Write attempts exhausted, dropping point"
        );
        WriteOutcome::GaveUp
    }

    /// Learn the demanded type and fix up `field` in the point.
    ///
    /// Returns false when the point cannot be retried.
    fn resolve_conflict(&self, point: &mut Point, field: &str, expected: &str, verbose: bool) -> bool {
        let Some(kind) = CoercionKind::from_backend_type(expected) else {
            error!(
                measurement = %point.measurement,
                field = %field,
                expected = %expected,
                "Type conflict with unknown column type, abandoning point"
            );
            return false;
        };

        self.cache.learn(field, kind);

        let Some(value) = point.fields.get(field) else {
            error!(
                measurement = %point.measurement,
                field = %field,
                "Type conflict on a field the point does not carry, abandoning point"
            );
            return false;
        };

        match coerce(value, kind) {
            // Already the demanded type, so the column is one no cast can reach
            Ok(coerced) if coerced == *value => {
                error!(
                    measurement = %point.measurement,
                    field = %field,
                    expected = %expected,
                    "Type conflict persists after coercion, abandoning point"
                );
                return false;
            }
            Ok(coerced) => {
                point.fields.insert(field.to_string(), coerced);
            }
            Err(e) => {
                if verbose {
                    info!(field = %field, error = %e, "Dropping field that cannot be coerced");
                } else {
                    debug!(field = %field, error = %e, "Dropping field that cannot be coerced");
                }
                point.fields.remove(field);
            }
        }

        if point.fields.is_empty() {
            debug!(measurement = %point.measurement, "No fields left to write");
            return false;
        }
        true
    }
}
