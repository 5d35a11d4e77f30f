//! In-memory time-series backend
//!
//! Behaves like an InfluxDB 1.x server as far as the forwarder can tell:
//! databases must exist before writes, every field column keeps the type of
//! its first write, and a write carrying a field of another type is
//! rejected with a type conflict. Used by tests and local dry runs.

use super::backend::{RetentionPolicy, TimeSeriesBackend, WriteError};
use super::point::Point;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct MemoryState {
    databases: HashSet<String>,
    /// (database, measurement, field) -> column type name
    columns: HashMap<(String, String, String), String>,
    retention_policies: HashMap<String, RetentionPolicy>,
    written: Vec<(String, Point)>,
    write_attempts: usize,
    statements: Vec<String>,
    unreachable: bool,
}

/// Backend keeping databases and typed columns in memory
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `database` already present
    pub fn with_database(self, database: &str) -> Self {
        self.lock().databases.insert(database.to_string());
        self
    }

    /// Pre-create a column with a fixed type (`integer`, `float`, `string`
    /// or `boolean`)
    pub fn with_column(self, database: &str, measurement: &str, field: &str, kind: &str) -> Self {
        self.lock().columns.insert(
            (database.to_string(), measurement.to_string(), field.to_string()),
            kind.to_string(),
        );
        self
    }

    /// Make every call fail as if the server were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn has_database(&self, database: &str) -> bool {
        self.lock().databases.contains(database)
    }

    /// Points accepted so far, in write order
    pub fn points(&self) -> Vec<Point> {
        self.lock().written.iter().map(|(_, p)| p.clone()).collect()
    }

    /// Points accepted into one measurement
    pub fn points_in(&self, measurement: &str) -> Vec<Point> {
        self.lock()
            .written
            .iter()
            .filter(|(_, p)| p.measurement == measurement)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Number of write calls, accepted or not
    pub fn write_attempts(&self) -> usize {
        self.lock().write_attempts
    }

    pub fn retention_policy(&self, database: &str) -> Option<RetentionPolicy> {
        self.lock().retention_policies.get(database).cloned()
    }

    /// Provisioning statements received, in order
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TimeSeriesBackend for MemoryBackend {
    async fn ping(&self) -> Result<()> {
        if self.lock().unreachable {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }

    async fn write_points(&self, database: &str, points: &[Point]) -> Result<(), WriteError> {
        let mut state = self.lock();
        state.write_attempts += 1;

        if state.unreachable {
            return Err(WriteError::Transport("connection refused".to_string()));
        }
        if !state.databases.contains(database) {
            return Err(WriteError::Rejected {
                status: 404,
                message: format!("database not found: \"{}\"", database),
            });
        }

        // Whole batch is checked before anything is stored
        for point in points {
            for (field, value) in &point.fields {
                let key = (database.to_string(), point.measurement.clone(), field.clone());
                if let Some(existing) = state.columns.get(&key) {
                    if existing != value.type_name() {
                        return Err(WriteError::TypeConflict {
                            field: field.clone(),
                            expected: existing.clone(),
                        });
                    }
                }
            }
        }

        for point in points {
            for (field, value) in &point.fields {
                state
                    .columns
                    .entry((database.to_string(), point.measurement.clone(), field.clone()))
                    .or_insert_with(|| value.type_name().to_string());
            }
            state.written.push((database.to_string(), point.clone()));
        }

        Ok(())
    }

    async fn create_database(&self, database: &str) -> Result<()> {
        let mut state = self.lock();
        if state.unreachable {
            anyhow::bail!("connection refused");
        }
        state.statements.push(format!("CREATE DATABASE {}", database));
        state.databases.insert(database.to_string());
        Ok(())
    }

    async fn drop_database(&self, database: &str) -> Result<()> {
        let mut state = self.lock();
        if state.unreachable {
            anyhow::bail!("connection refused");
        }
        state.statements.push(format!("DROP DATABASE {}", database));
        if !state.databases.remove(database) {
            anyhow::bail!("database not found: {}", database);
        }
        state.columns.retain(|(db, _, _), _| db != database);
        state.retention_policies.remove(database);
        Ok(())
    }

    async fn ensure_retention_policy(&self, database: &str, policy: &RetentionPolicy) -> Result<()> {
        let mut state = self.lock();
        if state.unreachable {
            anyhow::bail!("connection refused");
        }
        if !state.databases.contains(database) {
            anyhow::bail!("database not found: {}", database);
        }
        state
            .statements
            .push(format!("RETENTION POLICY {} ON {}", policy.name, database));
        state
            .retention_policies
            .insert(database.to_string(), policy.clone());
        Ok(())
    }
}
