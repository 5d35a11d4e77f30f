use crate::influx::{InfluxClient, InfluxConfig, RetentionPolicy, TimeSeriesBackend};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[cfg(test)]
mod tests;

/// One provisioned connection to the backend
pub struct Session {
    backend: Arc<dyn TimeSeriesBackend>,
    database: String,
    ready: AtomicBool,
}

impl Session {
    pub fn backend(&self) -> &dyn TimeSeriesBackend {
        self.backend.as_ref()
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Retire the session; writes still holding it fail fast
    fn retire(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }
}

/// Owns the single live backend session
pub struct SessionManager {
    current: RwLock<Option<Arc<Session>>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    /// No session until the first connect
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Connect to the InfluxDB server described by `config`.
    ///
    /// Returns whether the new session is ready. A failure is logged and
    /// leaves writes as no-ops until the next connect.
    pub async fn connect(&self, config: &InfluxConfig) -> bool {
        info!(
            url = %config.base_url(),
            database = %config.database,
            reset = config.reset,
            "Connecting to InfluxDB"
        );

        match InfluxClient::new(config) {
            Ok(client) => {
                self.connect_with(Arc::new(client), &config.database, config.reset)
                    .await
            }
            Err(e) => {
                error!(error = %e, "Failed to build InfluxDB client");
                self.install(None).await;
                false
            }
        }
    }

    /// Provision `database` on `backend` and make it the live session
    pub async fn connect_with(
        &self,
        backend: Arc<dyn TimeSeriesBackend>,
        database: &str,
        reset: bool,
    ) -> bool {
        let ready = match provision(backend.as_ref(), database, reset).await {
            Ok(()) => {
                info!(database = %database, "Session ready");
                true
            }
            Err(e) => {
                error!(database = %database, error = %format!("{:#}", e), "Connection failed, session not ready");
                false
            }
        };

        let session = Session {
            backend,
            database: database.to_string(),
            ready: AtomicBool::new(ready),
        };
        self.install(Some(Arc::new(session))).await;

        ready
    }

    /// Live session, if any
    pub async fn current(&self) -> Option<Arc<Session>> {
        self.current.read().await.clone()
    }

    /// Live session, only when it is ready for writes
    pub async fn ready_session(&self) -> Option<Arc<Session>> {
        self.current().await.filter(|s| s.is_ready())
    }

    pub async fn is_ready(&self) -> bool {
        self.ready_session().await.is_some()
    }

    /// Database of the live session
    pub async fn database(&self) -> Option<String> {
        self.current().await.map(|s| s.database.clone())
    }

    async fn install(&self, session: Option<Arc<Session>>) {
        let mut current = self.current.write().await;
        if let Some(old) = std::mem::replace(&mut *current, session) {
            old.retire();
        }
    }
}

/// Make sure the server answers, then create the database and its
/// retention policy (dropping the database first when `reset` is set)
async fn provision(backend: &dyn TimeSeriesBackend, database: &str, reset: bool) -> Result<()> {
    backend.ping().await.context("InfluxDB is not reachable")?;

    if reset {
        match backend.drop_database(database).await {
            Ok(()) => info!(database = %database, "Dropped database for reset"),
            Err(e) => warn!(database = %database, error = %e, "Could not drop database, continuing"),
        }
    }

    backend.create_database(database).await?;

    let policy = RetentionPolicy::two_year();
    backend
        .ensure_retention_policy(database, &policy)
        .await
        .with_context(|| format!("Failed to ensure retention policy '{}'", policy.name))?;

    Ok(())
}
