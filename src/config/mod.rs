// Client configuration: backend endpoint, stream tuning and UI bridge settings

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_BACKEND_URL: &str = "RESEARCH_BACKEND_URL";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "RESEARCH_IDLE_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Full client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where the research backend lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://localhost:8000`
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(rename = "streamPath", alias = "stream_path", default = "default_stream_path")]
    pub stream_path: String,
    #[serde(rename = "healthPath", alias = "health_path", default = "default_health_path")]
    pub health_path: String,
    #[serde(
        rename = "connectTimeoutSecs",
        alias = "connect_timeout_secs",
        default = "default_connect_timeout"
    )]
    pub connect_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_stream_path() -> String {
    "/research-stream".to_string()
}
fn default_health_path() -> String {
    "/health".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}

impl BackendConfig {
    pub fn stream_url(&self) -> String {
        join_url(&self.url, &self.stream_path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.url, &self.health_path)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            stream_path: default_stream_path(),
            health_path: default_health_path(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Event stream tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// Seconds without any event before the session fails. `0` disables.
    #[serde(
        rename = "idleTimeoutSecs",
        alias = "idle_timeout_secs",
        default = "default_idle_timeout"
    )]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout() -> u64 {
    300
}

impl StreamConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// UI bridge server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed origins; empty means any
    #[serde(rename = "corsOrigins", alias = "cors_origins", default)]
    pub cors_origins: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3420
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Config loader
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader for the per-user config file
    pub fn new() -> Self {
        Self {
            path: Self::default_config_path(),
        }
    }

    /// Loader for an explicit file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("research-stream").join("config.toml"))
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the file (defaults when missing) and apply environment overrides
    pub fn load(&self) -> Result<ClientConfig, ConfigError> {
        let mut config = match &self.path {
            Some(path) => Self::load_from_path(path)?.unwrap_or_default(),
            None => ClientConfig::default(),
        };
        apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a specific path. `Ok(None)` when the file is absent.
    pub fn load_from_path(path: &Path) -> Result<Option<ClientConfig>, ConfigError> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(None);
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ClientConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("Loaded config from {}", path.display());
        Ok(Some(config))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply environment overrides using `lookup` to read variables
pub fn apply_overrides<F>(config: &mut ClientConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
        config.backend.url = url.trim().to_string();
    }

    if let Some(raw) = lookup(ENV_IDLE_TIMEOUT_SECS) {
        config.stream.idle_timeout_secs =
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_IDLE_TIMEOUT_SECS.to_string(),
                    value: raw.clone(),
                })?;
    }

    Ok(())
}
