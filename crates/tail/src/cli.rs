//! Command-line flags and how they layer over the config file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use ari_domain::config::SchemaSourceKind;
use ari_domain::Config;

/// Follow the ARI event stream of an Asterisk server and print every event
/// as one JSON line.
#[derive(Debug, Parser)]
#[command(name = "ari-tail", version, about)]
pub struct Cli {
    /// TOML config file.  Flags below override its values.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// HTTP base URL of the server (e.g. `http://pbx:8088`).
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub user: Option<String>,

    #[arg(long, env = "ARI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Stasis application to subscribe to.  Repeatable.
    #[arg(long = "app", value_name = "NAME")]
    pub apps: Vec<String>,

    /// Receive events for all resources, not only subscribed ones.
    #[arg(long)]
    pub subscribe_all: bool,

    /// Use the compiled-in event catalogue instead of downloading it.
    #[arg(long)]
    pub builtin_schema: bool,

    /// Seconds between liveness pings (0 disables).
    #[arg(long, value_name = "SECS")]
    pub ping_interval: Option<u64>,

    /// Log as JSON instead of human-readable text.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// The config file (or defaults) with every given flag applied.
    pub fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(url) = &self.url {
            config.ari.base_url = url.clone();
        }
        if let Some(user) = &self.user {
            config.ari.username = user.clone();
        }
        if let Some(password) = &self.password {
            config.ari.password = Some(password.clone());
        }
        if !self.apps.is_empty() {
            config.ari.apps = self.apps.clone();
        }
        if self.subscribe_all {
            config.ari.subscribe_all = true;
        }
        if self.builtin_schema {
            config.schema.source = SchemaSourceKind::Builtin;
        }
        if let Some(secs) = self.ping_interval {
            config.ari.ping_interval_secs = secs;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "ari-tail",
            "--url",
            "https://pbx:8089",
            "--user",
            "bot",
            "--password",
            "pw",
            "--app",
            "ivr",
            "--app",
            "queue",
            "--subscribe-all",
            "--builtin-schema",
            "--ping-interval",
            "15",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.ari.base_url, "https://pbx:8089");
        assert_eq!(config.ari.username, "bot");
        assert_eq!(config.ari.resolve_password(), "pw");
        assert_eq!(config.ari.apps, vec!["ivr".to_string(), "queue".to_string()]);
        assert!(config.ari.subscribe_all);
        assert_eq!(config.schema.source, SchemaSourceKind::Builtin);
        assert_eq!(config.ari.ping_interval_secs, 15);
    }

    #[test]
    fn no_flags_keep_defaults() {
        let cli = Cli::try_parse_from(["ari-tail"]).unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.ari.base_url, "http://localhost:8088");
        assert_eq!(config.schema.source, SchemaSourceKind::Remote);
        assert!(config.ari.apps.is_empty());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["ari-tail", "--config", "/nonexistent/ari.toml"]).unwrap();
        let err = cli.resolve_config().unwrap_err();
        assert!(err.to_string().contains("loading config"));
    }
}
