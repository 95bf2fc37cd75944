//! Connection parameters and URL construction.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;

use ari_domain::Config;

use crate::types::AriError;

/// Characters left alone when encoding a query value or path segment:
/// ASCII alphanumerics and `- _ . ! ~ * ' ( )`.
pub(crate) const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const ARI_ROOT: &str = "/ari";

/// Everything needed to open the event socket.  Fixed for the lifetime of
/// one started session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// `wss`/`https` rather than `ws`/`http`.
    pub secure: bool,
    /// `host[:port]`.
    pub host: String,
    /// Path prefix in front of `/ari`, without a trailing slash.
    pub prefix: String,
    pub username: String,
    pub password: String,
    pub apps: Vec<String>,
    pub subscribe_all: bool,
}

impl ConnectionConfig {
    /// Derive the connection from the server's HTTP base URL.
    pub fn from_base_url(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, AriError> {
        let url = Url::parse(base_url)
            .map_err(|e| AriError::Config(format!("invalid base url {base_url:?}: {e}")))?;

        let secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => {
                return Err(AriError::Config(format!(
                    "unsupported scheme {other:?} in base url"
                )))
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| AriError::Config(format!("base url {base_url:?} has no host")))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            secure,
            host,
            prefix: url.path().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            apps: Vec::new(),
            subscribe_all: false,
        })
    }

    /// Build from the `[ari]` section of a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, AriError> {
        let ari = &config.ari;
        Ok(Self::from_base_url(&ari.base_url, &ari.username, ari.resolve_password())?
            .with_subscription(ari.apps.clone(), ari.subscribe_all))
    }

    pub fn with_subscription(mut self, apps: Vec<String>, subscribe_all: bool) -> Self {
        self.apps = apps;
        self.subscribe_all = subscribe_all;
        self
    }

    /// `{ws|wss}://{host}{prefix}/ari/events?app=..&api_key=..[&subscribeAll=true]`
    pub fn events_url(&self) -> String {
        self.build_events_url(&encode(&self.password))
    }

    /// [`events_url`](Self::events_url) with the password masked, for logs.
    pub fn redacted_events_url(&self) -> String {
        self.build_events_url("***")
    }

    /// Location of the Swagger event model document.
    pub fn api_docs_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}{}/api-docs/events.json", self.host, self.ari_root())
    }

    fn build_events_url(&self, password: &str) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let apps = self
            .apps
            .iter()
            .map(|a| encode(a))
            .collect::<Vec<_>>()
            .join(",");

        let mut url = format!(
            "{scheme}://{}{}/events?app={apps}&api_key={}:{password}",
            self.host,
            self.ari_root(),
            encode(&self.username),
        );
        if self.subscribe_all {
            url.push_str("&subscribeAll=true");
        }
        url
    }

    /// The prefix with `/ari` appended, unless the base URL already
    /// pointed at it.
    fn ari_root(&self) -> String {
        if self.prefix.ends_with(ARI_ROOT) {
            self.prefix.clone()
        } else {
            format!("{}{ARI_ROOT}", self.prefix)
        }
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}
