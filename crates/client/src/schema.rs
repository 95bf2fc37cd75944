//! Loading the event schema at start-up.

use std::sync::Arc;
use std::time::Duration;

use ari_protocol::{ApiSchema, SchemaError};

use crate::config::ConnectionConfig;

/// Default limit on the schema download.
pub const DEFAULT_SCHEMA_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SchemaLoadError {
    /// Connect failure or timeout: the server could not be reached at all.
    #[error("host is not reachable: {0}")]
    Unreachable(String),

    #[error("schema request returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("schema request failed: {0}")]
    Transport(String),

    #[error("invalid schema document: {0}")]
    Invalid(#[from] SchemaError),
}

impl SchemaLoadError {
    /// Failures surfaced as a network error rather than a load error.
    pub fn is_network(&self) -> bool {
        matches!(self, SchemaLoadError::Status { .. } | SchemaLoadError::Transport(_))
    }
}

/// Where the event model comes from.
#[async_trait::async_trait]
pub trait SchemaSource: Send + Sync {
    async fn load(&self, conn: &ConnectionConfig) -> Result<ApiSchema, SchemaLoadError>;
}

/// A schema known up front.
#[derive(Debug, Clone)]
pub struct StaticSchema(Arc<ApiSchema>);

impl StaticSchema {
    pub fn new(schema: ApiSchema) -> Self {
        Self(Arc::new(schema))
    }

    /// The catalogue compiled into `ari-protocol`.
    pub fn builtin() -> Self {
        Self::new(ApiSchema::builtin())
    }
}

#[async_trait::async_trait]
impl SchemaSource for StaticSchema {
    async fn load(&self, _conn: &ConnectionConfig) -> Result<ApiSchema, SchemaLoadError> {
        Ok(self.0.as_ref().clone())
    }
}

/// Downloads `api-docs/events.json` from the server with HTTP Basic auth.
#[derive(Debug, Clone)]
pub struct HttpSchemaSource {
    timeout: Duration,
}

impl HttpSchemaSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpSchemaSource {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_TIMEOUT)
    }
}

#[async_trait::async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn load(&self, conn: &ConnectionConfig) -> Result<ApiSchema, SchemaLoadError> {
        let url = conn.api_docs_url();
        tracing::debug!(url = %url, "loading event schema");

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| SchemaLoadError::Transport(e.to_string()))?;

        let resp = client
            .get(&url)
            .basic_auth(&conn.username, Some(&conn.password))
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let body = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(SchemaLoadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let schema = ApiSchema::from_events_json(&body)?;
        tracing::debug!(events = schema.len(), "event schema loaded");
        Ok(schema)
    }
}

fn from_reqwest(e: reqwest::Error) -> SchemaLoadError {
    if e.is_connect() || e.is_timeout() {
        SchemaLoadError::Unreachable(e.to_string())
    } else {
        SchemaLoadError::Transport(e.to_string())
    }
}
