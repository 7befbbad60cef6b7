use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Provider catalog file. Relative paths resolve against the config file's directory.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            catalog_path: default_catalog_path(),
            session: SessionConfig::default(),
            access: AccessConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config: Self = match fs::read_to_string(path).await {
            Ok(contents) => serde_saphyr::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if config.catalog_path.is_relative()
            && let Some(dir) = path.parent()
        {
            config.catalog_path = dir.join(&config.catalog_path);
        }
        Ok(config)
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("config/llm_models.yaml")
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Bound on a single upstream exchange. Zero disables it.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_seconds: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            upstream_timeout_seconds: default_upstream_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5555
}

fn default_request_timeout() -> u64 {
    300
}

fn default_upstream_timeout() -> u64 {
    120
}

fn default_max_body_bytes() -> usize {
    8 * 1024 * 1024
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Global chunk and memory budgets; providers may override either.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,
    #[serde(default = "default_memory_tokens")]
    pub memory_tokens: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: default_chunk_tokens(),
            memory_tokens: default_memory_tokens(),
        }
    }
}

fn default_chunk_tokens() -> usize {
    2048
}

fn default_memory_tokens() -> usize {
    65536
}

// ============================================================================
// AccessConfig
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// CIDR blocks or bare addresses allowed to call the API.
    #[serde(default = "default_allowed_networks")]
    pub allowed_networks: Vec<String>,
    /// Use the socket peer address and ignore forwarding headers.
    #[serde(default = "default_trust_proxy")]
    pub trust_proxy: bool,
    #[serde(default)]
    pub require_token: bool,
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Matched route paths that skip every check.
    #[serde(default = "default_exempt_routes")]
    pub exempt_routes: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allowed_networks: default_allowed_networks(),
            trust_proxy: default_trust_proxy(),
            require_token: false,
            tokens: Vec::new(),
            exempt_routes: default_exempt_routes(),
        }
    }
}

fn default_allowed_networks() -> Vec<String> {
    vec!["127.0.0.1/32".to_string(), "::1/128".to_string()]
}

fn default_trust_proxy() -> bool {
    true
}

fn default_exempt_routes() -> Vec<String> {
    vec!["/livez".to_string(), "/readyz".to_string()]
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("failed to read provider catalog {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse provider catalog {path}: {source}")]
    CatalogYaml {
        path: PathBuf,
        source: serde_saphyr::Error,
    },

    #[error("invalid provider catalog: {0}")]
    Catalog(String),
}

// ============================================================================
// Tests
// ============================================================================
