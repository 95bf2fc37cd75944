mod ari;
mod reconnect;
mod schema;

pub use ari::*;
pub use reconnect::*;
pub use schema::*;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub ari: AriConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
}

impl Config {
    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.ari.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "ari.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !(self.ari.base_url.starts_with("http://")
            || self.ari.base_url.starts_with("https://"))
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "ari.base_url".into(),
                message: "base_url must use http:// or https://".into(),
            });
        }

        if self.ari.username.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "ari.username".into(),
                message: "username must not be empty".into(),
            });
        }

        // Asterisk rejects the socket without at least one application.
        if self.ari.apps.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "ari.apps".into(),
                message: "no applications configured".into(),
            });
        }

        for (i, app) in self.ari.apps.iter().enumerate() {
            if app.trim().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("ari.apps[{i}]"),
                    message: "application name must not be empty".into(),
                });
            }
        }

        if self.reconnect.max_attempts == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "reconnect.max_attempts".into(),
                message: "max_attempts must be greater than 0".into(),
            });
        }

        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "reconnect.initial_delay_ms".into(),
                message: format!(
                    "initial delay {}ms exceeds max_delay_ms {}ms (every retry will use the ceiling)",
                    self.reconnect.initial_delay_ms, self.reconnect.max_delay_ms
                ),
            });
        }

        errors
    }

    /// [`validate`](Self::validate), failing on the first `Error`-severity
    /// issue.  Warnings are logged and otherwise ignored.
    pub fn ensure_valid(&self) -> Result<()> {
        for issue in self.validate() {
            match issue.severity {
                ConfigSeverity::Error => {
                    return Err(Error::Config(format!("{}: {}", issue.field, issue.message)))
                }
                ConfigSeverity::Warning => {
                    tracing::warn!(field = %issue.field, "{}", issue.message)
                }
            }
        }
        Ok(())
    }

    /// `true` when [`validate`](Self::validate) reports no `Error`-severity issue.
    pub fn is_valid(&self) -> bool {
        !self
            .validate()
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error)
    }
}
