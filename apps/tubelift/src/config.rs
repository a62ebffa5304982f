//! Uploader configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/tubelift/config.toml`
//! - Windows: `%APPDATA%/tubelift/config.toml`
//!
//! The API token may be left out of the file and supplied through
//! `TUBELIFT_TOKEN` instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tubelift_transfer::{
    DEFAULT_BACKOFF_BASE, DEFAULT_CONTENT_TYPE, DEFAULT_MAX_ATTEMPTS, Privacy,
};

/// Environment variable overriding [`Config::token`].
pub const TOKEN_ENV: &str = "TUBELIFT_TOKEN";

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the PeerTube instance, e.g. `https://peertube.example`.
    #[serde(default)]
    pub base_url: String,

    /// OAuth access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Channel new videos are published to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<u64>,

    /// Playlist new videos are added to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,

    #[serde(default)]
    pub privacy: Privacy,

    /// Chunk size in MiB.
    #[serde(default = "default_chunk_size_mib")]
    pub chunk_size_mib: u64,

    /// Requests per chunk before the upload is aborted.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base in seconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,

    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Seconds without progress before a request fails.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_chunk_size_mib() -> u64 {
    50
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_base() -> f64 {
    DEFAULT_BACKOFF_BASE
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.into()
}

fn default_request_timeout() -> u64 {
    600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            channel_id: None,
            playlist_id: None,
            privacy: Privacy::default(),
            chunk_size_mib: default_chunk_size_mib(),
            max_attempts: default_max_attempts(),
            backoff_base: default_backoff_base(),
            content_type: default_content_type(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the default location), creating a
    /// default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold the API token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Token from `TUBELIFT_TOKEN`, falling back to the file.
    pub fn resolve_token(&self) -> Option<String> {
        token_from(std::env::var(TOKEN_ENV).ok(), self.token.as_deref())
    }

    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_mib.saturating_mul(1024 * 1024)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn token_from(env: Option<String>, file: Option<&str>) -> Option<String> {
    env.filter(|t| !t.trim().is_empty())
        .or_else(|| file.filter(|t| !t.trim().is_empty()).map(str::to_string))
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("tubelift").join("config.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("tubelift")
            .join("config.toml"))
    }
}
