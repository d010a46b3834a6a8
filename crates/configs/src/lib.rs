//! # configs
//!
//! Layered runtime settings. Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. `config/prastha.toml` (optional)
//! 3. `PRASTHA__SECTION__KEY` environment variables
//!
//! A `.env` file, when present, is loaded into the environment before the
//! variables are read.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const ENV_PREFIX: &str = "PRASTHA";
pub const DEFAULT_CONFIG_FILE: &str = "config/prastha";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub storage: StorageSettings,
    pub expiry: ExpirySettings,
    pub fanout: FanoutSettings,
    pub threads: ThreadSettings,
    pub gossips: GossipSettings,
    pub limits: LimitSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    #[serde(deserialize_with = "secret_string")]
    pub database_url: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpirySettings {
    pub sweep_interval_secs: u64,
    pub urgent_within_mins: i64,
    pub soon_within_mins: i64,
    pub expired_alert_window_mins: i64,
}

impl ExpirySettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FanoutSettings {
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadSettings {
    pub max_duration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GossipSettings {
    pub max_duration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitSettings {
    pub max_message_len: usize,
    pub max_gossip_len: usize,
    pub max_comment_len: usize,
    pub max_reply_depth: usize,
    pub read_retries: u32,
}

fn secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Upper bound for configured lifetimes, ten years.
const MAX_DURATION_HOURS: i64 = 87_600;

const DEFAULTS: &str = r#"
[server]
bind_addr = "0.0.0.0:8080"

[log]
format = "pretty"

[storage]
backend = "memory"
database_url = "sqlite://prastha.db?mode=rwc"

[expiry]
sweep_interval_secs = 30
urgent_within_mins = 30
soon_within_mins = 120
expired_alert_window_mins = 720

[fanout]
channel_capacity = 256

[threads]
max_duration_hours = 168

[gossips]
max_duration_hours = 720

[limits]
max_message_len = 2000
max_gossip_len = 1000
max_comment_len = 500
max_reply_depth = 16
read_retries = 2
"#;

impl Settings {
    /// Loads `.env`, the optional config file and the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::build(Some(Path::new(DEFAULT_CONFIG_FILE)), None)
    }

    /// Builds settings from an optional file and either the process
    /// environment or, when `env` is given, that map of variables.
    pub fn build(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        let mut builder = Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml));
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |key, reason: &str| {
            Err(SettingsError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };
        if self.server.bind_addr.trim().is_empty() {
            return invalid("server.bind_addr", "must not be empty");
        }
        if self.expiry.sweep_interval_secs == 0 {
            return invalid("expiry.sweep_interval_secs", "must be positive");
        }
        if self.expiry.urgent_within_mins <= 0 {
            return invalid("expiry.urgent_within_mins", "must be positive");
        }
        if self.expiry.soon_within_mins < self.expiry.urgent_within_mins {
            return invalid("expiry.soon_within_mins", "must be at least urgent_within_mins");
        }
        if self.expiry.expired_alert_window_mins < 0 {
            return invalid("expiry.expired_alert_window_mins", "must not be negative");
        }
        if self.fanout.channel_capacity == 0 {
            return invalid("fanout.channel_capacity", "must be positive");
        }
        if !(1..=MAX_DURATION_HOURS).contains(&self.threads.max_duration_hours) {
            return invalid("threads.max_duration_hours", "must be between 1 and 87600");
        }
        if !(1..=MAX_DURATION_HOURS).contains(&self.gossips.max_duration_hours) {
            return invalid("gossips.max_duration_hours", "must be between 1 and 87600");
        }
        if self.limits.max_reply_depth == 0 {
            return invalid("limits.max_reply_depth", "must be positive");
        }
        if self.storage.backend == StorageBackend::Sqlite
            && self.storage.database_url.expose_secret().trim().is_empty()
        {
            return invalid("storage.database_url", "required for the sqlite backend");
        }
        Ok(())
    }
}
