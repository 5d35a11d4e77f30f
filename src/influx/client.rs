use super::backend::{parse_type_conflict, RetentionPolicy, TimeSeriesBackend, WriteError};
use super::line_protocol::encode_points;
use super::point::Point;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Backend connection settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InfluxConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Drop the database before provisioning it
    #[serde(default)]
    pub reset: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8086
}

fn default_user() -> String {
    "indigo".to_string()
}

fn default_password() -> String {
    "indigo".to_string()
}

fn default_database() -> String {
    "indigo".to_string()
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            database: default_database(),
            reset: false,
        }
    }
}

impl InfluxConfig {
    /// Base URL of the HTTP API. A host given with a scheme is used verbatim
    /// (plus the port when it carries none).
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            let without_scheme = host.splitn(2, "://").nth(1).unwrap_or_default();
            if without_scheme.contains(':') {
                host.to_string()
            } else {
                format!("{}:{}", host, self.port)
            }
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }

    /// True when switching from `other` requires a new session
    pub fn connection_differs(&self, other: &InfluxConfig) -> bool {
        self.host != other.host
            || self.port != other.port
            || self.user != other.user
            || self.password != other.password
            || self.database != other.database
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct StatementResult {
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the InfluxDB 1.x API
pub struct InfluxClient {
    base_url: String,
    user: String,
    password: String,
    http_client: Client,
}

impl InfluxClient {
    /// Create a client for the configured host and credentials
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        Self::with_base_url(config.base_url(), &config.user, &config.password)
    }

    /// Create a client with an explicit base URL (for testing with a mock server)
    pub fn with_base_url(base_url: String, user: &str, password: &str) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("homeflux/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            user: user.to_string(),
            password: password.to_string(),
            http_client,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.user.is_empty() {
            request
        } else {
            request.basic_auth(&self.user, Some(&self.password))
        }
    }

    /// Run one InfluxQL statement, failing on HTTP or statement errors
    async fn query(&self, statement: &str) -> Result<()> {
        let url = format!("{}/query", self.base_url);
        debug!(statement = %statement, "Running InfluxQL statement");

        let response = self
            .authorize(self.http_client.post(&url))
            .query(&[("q", statement)])
            .send()
            .await
            .with_context(|| format!("Failed to send query '{}'", statement))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());

        let parsed: Option<QueryResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|p| p.error)
                .unwrap_or(body);
            anyhow::bail!("Query '{}' failed with status {}: {}", statement, status, message);
        }

        if let Some(parsed) = parsed {
            if let Some(error) = parsed.error {
                anyhow::bail!("Query '{}' failed: {}", statement, error);
            }
            if let Some(error) = parsed.results.into_iter().find_map(|r| r.error) {
                anyhow::bail!("Query '{}' failed: {}", statement, error);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TimeSeriesBackend for InfluxClient {
    async fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.base_url);
        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .with_context(|| format!("Failed to reach InfluxDB at {}", self.base_url))?;

        if !response.status().is_success() {
            anyhow::bail!("Ping to {} failed with status {}", self.base_url, response.status());
        }
        Ok(())
    }

    async fn write_points(&self, database: &str, points: &[Point]) -> Result<(), WriteError> {
        let url = format!("{}/write", self.base_url);
        let body = encode_points(points);

        let response = self
            .authorize(self.http_client.post(&url))
            .query(&[("db", database)])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);

        if status == StatusCode::BAD_REQUEST {
            if let Some((field, expected)) = parse_type_conflict(&message) {
                return Err(WriteError::TypeConflict { field, expected });
            }
        }

        Err(WriteError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn create_database(&self, database: &str) -> Result<()> {
        self.query(&format!("CREATE DATABASE {}", quote_ident(database)))
            .await
            .with_context(|| format!("Failed to create database '{}'", database))?;
        info!(database = %database, "Database ready");
        Ok(())
    }

    async fn drop_database(&self, database: &str) -> Result<()> {
        self.query(&format!("DROP DATABASE {}", quote_ident(database)))
            .await
            .with_context(|| format!("Failed to drop database '{}'", database))
    }

    async fn ensure_retention_policy(&self, database: &str, policy: &RetentionPolicy) -> Result<()> {
        let settings = format!(
            "{} ON {} DURATION {} REPLICATION {}{}",
            quote_ident(&policy.name),
            quote_ident(database),
            policy.duration,
            policy.replication,
            if policy.default { " DEFAULT" } else { "" }
        );

        match self.query(&format!("CREATE RETENTION POLICY {}", settings)).await {
            Ok(()) => {}
            Err(e) if e.to_string().contains("already exists") => {
                info!(
                    policy = %policy.name,
                    database = %database,
                    "Retention policy exists with other settings, altering"
                );
                self.query(&format!("ALTER RETENTION POLICY {}", settings))
                    .await
                    .with_context(|| format!("Failed to alter retention policy '{}'", policy.name))?;
            }
            Err(e) => {
                return Err(e.context(format!(
                    "Failed to create retention policy '{}'",
                    policy.name
                )))
            }
        }

        info!(policy = %policy.name, database = %database, "Retention policy ready");
        Ok(())
    }
}

/// Quote an InfluxQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}
