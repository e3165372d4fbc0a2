use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::time::Duration;

use crate::services::{MarkAllReconcile, MutationMode, UnknownEventPolicy};

/// Region name (`bell`, `badge`, `panel`, ...) to CSS property/value pairs
pub type StyleOverrides = BTreeMap<String, BTreeMap<String, String>>;

/// Widget configuration supplied by the host application
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub endpoint: String,
    pub access_key: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    pub user_id: String,
    #[serde(default)]
    pub styles: StyleOverrides,
    #[serde(default)]
    pub messages: HashMap<String, String>,
    #[serde(default)]
    pub unknown_events: UnknownEventPolicy,
    #[serde(default)]
    pub mutation_mode: MutationMode,
    #[serde(default)]
    pub mark_all_reconcile: MarkAllReconcile,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup using the `NOTIBELL_*` variable names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("NOTIBELL_ENDPOINT").ok_or(ConfigError::MissingEndpoint)?;

        let access_key = lookup("NOTIBELL_ACCESS_KEY").ok_or(ConfigError::MissingAccessKey)?;

        let user_id = lookup("NOTIBELL_USER_ID").ok_or(ConfigError::MissingUserId)?;

        let locale = lookup("NOTIBELL_LOCALE").unwrap_or_else(default_locale);

        let unknown_events = match lookup("NOTIBELL_UNKNOWN_EVENTS") {
            Some(value) => value.parse().map_err(ConfigError::InvalidValue)?,
            None => UnknownEventPolicy::default(),
        };

        let mutation_mode = match lookup("NOTIBELL_MUTATION_MODE") {
            Some(value) => value.parse().map_err(ConfigError::InvalidValue)?,
            None => MutationMode::default(),
        };

        let mark_all_reconcile = match lookup("NOTIBELL_MARK_ALL_RECONCILE") {
            Some(value) => value.parse().map_err(ConfigError::InvalidValue)?,
            None => MarkAllReconcile::default(),
        };

        let request_timeout_secs = match lookup("NOTIBELL_REQUEST_TIMEOUT_SECS") {
            Some(value) => value.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!("NOTIBELL_REQUEST_TIMEOUT_SECS must be a number: {}", value))
            })?,
            None => default_timeout_secs(),
        };

        let config = Config {
            endpoint,
            access_key,
            locale,
            user_id,
            styles: StyleOverrides::new(),
            messages: HashMap::new(),
            unknown_events,
            mutation_mode,
            mark_all_reconcile,
            request_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a host-supplied JSON configuration document
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidJson(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.access_key.trim().is_empty() {
            return Err(ConfigError::MissingAccessKey);
        }
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::MissingUserId);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("NOTIBELL_ENDPOINT environment variable not set")]
    MissingEndpoint,

    #[error("Access key not set")]
    MissingAccessKey,

    #[error("User id not set")]
    MissingUserId,

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Invalid configuration JSON: {0}")]
    InvalidJson(String),
}
