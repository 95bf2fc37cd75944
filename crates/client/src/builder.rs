//! Builder pattern for constructing an [`AriClient`].

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use ari_domain::config::SchemaSourceKind;
use ari_domain::Config;
use ari_protocol::ApiSchema;
use parking_lot::Mutex;

use crate::backoff::ReconnectBackoff;
use crate::client::{AriClient, ClientCore};
use crate::config::ConnectionConfig;
use crate::schema::{HttpSchemaSource, SchemaSource, StaticSchema, DEFAULT_SCHEMA_TIMEOUT};
use crate::types::AriError;

/// Fluent builder for [`AriClient`].
///
/// # Example
///
/// ```rust,no_run
/// # use ari_client::AriClientBuilder;
/// # async fn run() -> Result<(), ari_client::AriError> {
/// let client = AriClientBuilder::new()
///     .base_url("http://pbx.local:8088")
///     .username("asterisk")
///     .password("secret")
///     .build()?;
/// client.start(vec!["ivr".into()], false).await?;
/// # Ok(())
/// # }
/// ```
pub struct AriClientBuilder {
    pub(crate) base_url: String,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) apps: Vec<String>,
    pub(crate) subscribe_all: bool,
    pub(crate) reconnect_backoff: ReconnectBackoff,
    pub(crate) schema_source: Option<Arc<dyn SchemaSource>>,
    pub(crate) schema_timeout: Duration,
}

impl AriClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: "http://localhost:8088".into(),
            username: "asterisk".into(),
            password: String::new(),
            apps: Vec::new(),
            subscribe_all: false,
            reconnect_backoff: ReconnectBackoff::default(),
            schema_source: None,
            schema_timeout: DEFAULT_SCHEMA_TIMEOUT,
        }
    }

    /// Everything the `[ari]`, `[reconnect]` and `[schema]` sections say.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new()
            .base_url(config.ari.base_url.clone())
            .username(config.ari.username.clone())
            .password(config.ari.resolve_password())
            .apps(config.ari.apps.clone())
            .subscribe_all(config.ari.subscribe_all)
            .reconnect_backoff(ReconnectBackoff::from(&config.reconnect))
            .schema_timeout(Duration::from_millis(config.schema.timeout_ms));
        if config.schema.source == SchemaSourceKind::Builtin {
            builder = builder.builtin_schema();
        }
        builder
    }

    // ── Server ───────────────────────────────────────────────────────

    /// HTTP base URL of the server, with any path prefix
    /// (e.g. `https://pbx.example.com/asterisk`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Applications used by [`AriClient::connect`].
    pub fn apps(mut self, apps: impl Into<Vec<String>>) -> Self {
        self.apps = apps.into();
        self
    }

    pub fn subscribe_all(mut self, on: bool) -> Self {
        self.subscribe_all = on;
        self
    }

    // ── Behavior ─────────────────────────────────────────────────────

    /// Override the reconnect backoff policy.
    pub fn reconnect_backoff(mut self, cfg: ReconnectBackoff) -> Self {
        self.reconnect_backoff = cfg;
        self
    }

    // ── Event schema ─────────────────────────────────────────────────

    /// Use this schema instead of downloading one.
    pub fn schema(self, schema: ApiSchema) -> Self {
        self.schema_source(StaticSchema::new(schema))
    }

    /// Use the catalogue compiled into `ari-protocol`.
    pub fn builtin_schema(self) -> Self {
        self.schema_source(StaticSchema::builtin())
    }

    pub fn schema_source(mut self, source: impl SchemaSource + 'static) -> Self {
        self.schema_source = Some(Arc::new(source));
        self
    }

    /// Limit on the schema download (default 10s).
    pub fn schema_timeout(mut self, timeout: Duration) -> Self {
        self.schema_timeout = timeout;
        self
    }

    /// Build the [`AriClient`].
    pub fn build(self) -> Result<AriClient, AriError> {
        if self.base_url.is_empty() {
            return Err(AriError::Config("base_url is required".into()));
        }
        let connection = ConnectionConfig::from_base_url(&self.base_url, self.username, self.password)?
            .with_subscription(self.apps, self.subscribe_all);

        let schema_source: Arc<dyn SchemaSource> = match self.schema_source {
            Some(source) => source,
            None => Arc::new(HttpSchemaSource::new(self.schema_timeout)),
        };

        Ok(AriClient {
            core: Arc::new(ClientCore::default()),
            connection,
            reconnect_backoff: self.reconnect_backoff,
            schema_source,
            schema: Mutex::new(None),
            session: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
        })
    }
}

impl Default for AriClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_or_bad_base_url() {
        assert!(matches!(
            AriClientBuilder::new().base_url("").build(),
            Err(AriError::Config(_))
        ));
        assert!(AriClientBuilder::new().base_url("gopher://x").build().is_err());
    }

    #[test]
    fn from_config_carries_everything() {
        let config: Config = toml::from_str(
            r#"
            [ari]
            base_url = "https://pbx.example.com/asterisk"
            username = "bot"
            password = "pw"
            apps = ["ivr", "queue"]
            subscribe_all = true

            [reconnect]
            initial_delay_ms = 50
            max_delay_ms = 400
            max_attempts = 4

            [schema]
            source = "builtin"
            "#,
        )
        .unwrap();

        let client = AriClientBuilder::from_config(&config).build().unwrap();
        let conn = client.connection();
        assert!(conn.secure);
        assert_eq!(conn.prefix, "/asterisk");
        assert_eq!(conn.username, "bot");
        assert_eq!(conn.apps, vec!["ivr".to_string(), "queue".to_string()]);
        assert!(conn.subscribe_all);
        assert_eq!(client.reconnect_backoff.max_attempts, 4);
        assert_eq!(client.reconnect_backoff.initial_delay, Duration::from_millis(50));
    }
}
