//! Client configuration.
//!
//! Configuration is stored at `~/.config/dashsession/config.json`. Missing
//! fields fall back to defaults, and `DASHSESSION_*` environment variables
//! override whatever the file says.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::store::SESSION_FILE;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "dashsession";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// HTTP request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_VALIDATE_PATH: &str = "/api/user/profile/";
const DEFAULT_REFRESH_PATH: &str = "/api/token/refresh/";
const DEFAULT_LOGIN_PATH: &str = "/api/token/";

pub const ENV_API_URL: &str = "DASHSESSION_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "DASHSESSION_TIMEOUT_SECS";
pub const ENV_SINGLE_FLIGHT: &str = "DASHSESSION_SINGLE_FLIGHT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Authenticated GET used to probe whether the access token is accepted
    pub validate_path: String,
    pub refresh_path: String,
    pub login_path: String,
    pub request_timeout_secs: u64,
    /// Serialise refreshes inside this process so concurrent callers share one
    pub single_flight_refresh: bool,
    /// Overrides the default session file location
    pub session_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            validate_path: DEFAULT_VALIDATE_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            single_flight_refresh: true,
            session_file: None,
        }
    }
}

impl Config {
    /// Defaults pointed at `base_url`. Handy for tests and embedding.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `DASHSESSION_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_SECS),
            }
        }
        if let Some(raw) = lookup(ENV_SINGLE_FLIGHT) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.single_flight_refresh = true,
                "0" | "false" | "no" | "off" => self.single_flight_refresh = false,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_SINGLE_FLIGHT),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the token pair is persisted.
    pub fn session_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.session_file {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(SESSION_FILE))
    }

    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.api_base_url, path)
    }
}

/// Join a base URL and a path with exactly one slash between them.
/// Absolute URLs in `path` are returned unchanged.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
