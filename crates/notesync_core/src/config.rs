//! Client configuration.
//!
//! # Responsibility
//! - Load remote-store connection settings from the environment or JSON.
//! - Provide tunable sync constants with production defaults.
//!
//! # Invariants
//! - A config with any required key missing or blank never produces a usable
//!   client; callers show `CONFIG_MISSING_MESSAGE` instead.

use crate::error::ErrorClass;
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Static message shown in place of the whole interactive surface.
pub const CONFIG_MISSING_MESSAGE: &str =
    "Remote store config missing. Set the NOTESYNC_* environment values and restart.";

const ENV_PREFIX: &str = "NOTESYNC_";

/// Connection settings for the remote document store and identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteStoreConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
    pub measurement_id: Option<String>,
    /// Enables app attestation when present.
    pub app_check_site_key: Option<String>,
}

/// Keys checked by `RemoteStoreConfig::validate`, as environment suffixes.
pub const REQUIRED_KEYS: [&str; 6] = [
    "API_KEY",
    "AUTH_DOMAIN",
    "PROJECT_ID",
    "STORAGE_BUCKET",
    "MESSAGING_SENDER_ID",
    "APP_ID",
];

impl RemoteStoreConfig {
    /// Reads `NOTESYNC_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `NOTESYNC_*` values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            api_key: read("API_KEY"),
            auth_domain: read("AUTH_DOMAIN"),
            project_id: read("PROJECT_ID"),
            storage_bucket: read("STORAGE_BUCKET"),
            messaging_sender_id: read("MESSAGING_SENDER_ID"),
            app_id: read("APP_ID"),
            measurement_id: read("MEASUREMENT_ID"),
            app_check_site_key: read("APP_CHECK_SITE_KEY"),
        }
    }

    /// Parses a camelCase JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(ConfigError::Parse)
    }

    /// Checks that every required key is present and non-blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            &self.api_key,
            &self.auth_domain,
            &self.project_id,
            &self.storage_bucket,
            &self.messaging_sender_id,
            &self.app_id,
        ];
        let missing: Vec<&'static str> = REQUIRED_KEYS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(key, _)| *key)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        warn!(
            "event=config_validate module=config status=error missing={}",
            missing.join(",")
        );
        Err(ConfigError::Incomplete { missing })
    }

    pub fn app_check_enabled(&self) -> bool {
        self.app_check_site_key.is_some()
    }
}

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Incomplete { missing: Vec<&'static str> },
    Parse(serde_json::Error),
}

impl ConfigError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::ConfigurationFatal
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete { missing } => {
                write!(f, "remote store config incomplete: missing {}", missing.join(", "))
            }
            Self::Parse(err) => write!(f, "invalid remote store config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Incomplete { .. } => None,
            Self::Parse(err) => Some(err),
        }
    }
}

/// Sync engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Size of the live first page and of each older page fetch.
    pub notes_page_size: usize,
    /// Pending mutations kept; oldest are dropped beyond this.
    pub max_queue_len: usize,
    /// Retry interval after a clean drain, and the periodic flush tick.
    pub base_interval_ms: u64,
    pub max_backoff_ms: u64,
    /// Undo/redo entries kept per editing session.
    pub max_history: usize,
    pub notice_duration_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            notes_page_size: 40,
            max_queue_len: 250,
            base_interval_ms: 1_200,
            max_backoff_ms: 15_000,
            max_history: 200,
            notice_duration_ms: 1_600,
        }
    }
}
