//! # Client configuration — `notes-client.toml`
//!
//! Defines the TOML configuration file read at client startup
//! (filename: [`ClientConfig::filename`] = `"notes-client.toml"`). It tells the
//! transport where the notes API lives and tells the session layer where the
//! signed-in session is persisted.
//!
//! ## Structure
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8000"
//! timeout_secs = 30
//!
//! [session]
//! storage_key = "auth-storage"
//! # data_dir = "/var/lib/notes"   # defaults to the platform data dir
//! ```
//!
//! ## Types
//!
//! | Struct | Purpose |
//! |--------|---------|
//! | [`ClientConfig`] | Top-level config. TOML (de)serialisation, file loading and environment overrides. |
//! | [`ApiConfig`] | API section: base URL and request timeout (default **30 seconds**). |
//! | [`SessionConfig`] | Session section: storage key (default `"auth-storage"`) and optional data directory. |
//!
//! All structs derive `Default` (with sensible production defaults) so that a
//! missing or empty config file is equivalent to the default configuration.
//!
//! ## Environment
//!
//! [`ClientConfig::load`] reads a `.env` file via `dotenvy` (if present) and lets
//! `NOTES_API_URL` and `NOTES_DATA_DIR` override the file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const API_URL_ENV: &str = "NOTES_API_URL";
pub const DATA_DIR_ENV: &str = "NOTES_DATA_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration stored in `notes-client.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Notes API configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root URL of the notes REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds. 0 disables the timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Session persistence configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name under which the session is persisted.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Directory holding the persisted session. `None` means the platform
    /// data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_storage_key() -> String {
    "auth-storage".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            data_dir: None,
        }
    }
}

impl SessionConfig {
    /// Directory the session file lives in.
    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("notes-client"),
        }
    }
}

impl ClientConfig {
    /// Builder method to point the client at another API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    /// Builder method to set the session data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session.data_dir = Some(dir.into());
        self
    }

    /// The well-known filename for the config file.
    pub fn filename() -> &'static str {
        "notes-client.toml"
    }

    /// Parse from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Read the config file (a missing file yields the defaults) and apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file missing, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        dotenvy::dotenv().ok();
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply `NOTES_API_URL` / `NOTES_DATA_DIR` as resolved by `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.session.data_dir = Some(PathBuf::from(dir.trim()));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.session.storage_key, "auth-storage");
        assert_eq!(config.api.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            [api]
            base_url = "https://notes.example.com"

            [session]
            data_dir = "/tmp/notes"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://notes.example.com");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.session.storage_key, "auth-storage");
        assert_eq!(config.session.resolved_data_dir(), PathBuf::from("/tmp/notes"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ClientConfig::default()
            .with_base_url("http://api.internal:9000")
            .with_data_dir("/srv/notes");
        let text = config.to_toml().unwrap();
        assert_eq!(ClientConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let config = ClientConfig::default().with_overrides(|key| match key {
            API_URL_ENV => Some(" http://override:1234 ".to_string()),
            DATA_DIR_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.api.base_url, "http://override:1234");
        assert!(config.session.data_dir.is_none());
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = ClientConfig::from_toml("[api]\ntimeout_secs = 0\n").unwrap();
        assert!(config.api.timeout().is_none());
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!(
            "notes_client_missing_{}.toml",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.session.storage_key, "auth-storage");
    }
}
