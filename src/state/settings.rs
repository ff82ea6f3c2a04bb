// SPDX-License-Identifier: MPL-2.0

use crate::config::{APP_ID, DEFAULT_BACKEND_URL, ENV_ANON_KEY, ENV_BACKEND_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_banner_seconds() -> u64 {
    4
}

fn default_feed_page_size() -> usize {
    30
}

/// Persistent application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Public project key sent with every request. Not a secret.
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How long an error banner stays up before it dismisses itself
    #[serde(default = "default_banner_seconds")]
    pub banner_seconds: u64,
    #[serde(default = "default_feed_page_size")]
    pub feed_page_size: usize,
    /// Keep the session in the secret service between launches
    #[serde(default)]
    pub remember_session: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            anon_key: String::new(),
            request_timeout_secs: default_request_timeout(),
            banner_seconds: default_banner_seconds(),
            feed_page_size: default_feed_page_size(),
            remember_session: false,
        }
    }
}

impl AppSettings {
    /// Get the settings file path (~/.config/io.github.touchline.Touchline/settings.json)
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from disk plus environment overrides, or defaults if not found
    pub fn load() -> Self {
        let settings = match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        settings.with_overrides(|key| std::env::var(key).ok())
    }

    /// A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring malformed settings");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
            self.backend_url = url;
        }
        if let Some(key) = var(ENV_ANON_KEY).filter(|v| !v.is_empty()) {
            self.anon_key = key;
        }
        self
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn banner_duration(&self) -> Duration {
        Duration::from_secs(self.banner_seconds)
    }
}
