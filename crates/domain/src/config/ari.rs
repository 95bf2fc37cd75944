use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ARI endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AriConfig {
    /// HTTP base URL of the Asterisk server, including any path prefix
    /// configured in `http.conf` (e.g. `https://pbx.example.com/asterisk`).
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_username")]
    pub username: String,
    /// Literal password.  Prefer `password_env` outside of local testing.
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable consulted when `password` is not set.
    #[serde(default = "d_password_env")]
    pub password_env: String,
    /// Stasis applications to subscribe to on the event socket.
    #[serde(default)]
    pub apps: Vec<String>,
    /// Ask Asterisk to deliver events for every resource, not only the
    /// ones the applications are subscribed to.
    #[serde(default)]
    pub subscribe_all: bool,
    /// Seconds between liveness pings on the event socket.  `0` disables them.
    #[serde(default)]
    pub ping_interval_secs: u64,
}

impl Default for AriConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            username: d_username(),
            password: None,
            password_env: d_password_env(),
            apps: Vec::new(),
            subscribe_all: false,
            ping_interval_secs: 0,
        }
    }
}

impl AriConfig {
    /// The literal password if configured, otherwise the value of
    /// `password_env` (empty when the variable is unset).
    pub fn resolve_password(&self) -> String {
        match &self.password {
            Some(p) => p.clone(),
            None => std::env::var(&self.password_env).unwrap_or_default(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://localhost:8088".into()
}

fn d_username() -> String {
    "asterisk".into()
}

fn d_password_env() -> String {
    "ARI_PASSWORD".into()
}
