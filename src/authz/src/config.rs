//! Plugin configuration loading and validation

use crate::endpoints::{Endpoints, DEFAULT_SKIP_ENDPOINTS};
use crate::error::{AuthzError, Result};
use crate::resolver::AncestorWalk;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Environment variable overriding `server.listen_addr`
pub const ENV_LISTEN_ADDR: &str = "HBM_LISTEN_ADDR";

/// Environment variable overriding `storage.database_url`
pub const ENV_DATABASE_URL: &str = "HBM_DATABASE_URL";

/// Complete plugin configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub authorization: AuthorizationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
        }
    }
}

/// Where grants and ownership records live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local; state is lost on restart
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: None,
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout(),
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthorizationConfig {
    /// Path regexes allowed without evaluation
    #[serde(default = "default_skip_endpoints")]
    pub skip_endpoints: Vec<String>,
    /// OPTIONS requests are allowed without evaluation
    #[serde(default = "default_true")]
    pub bypass_options: bool,
    #[serde(default)]
    pub ancestor_walk: AncestorWalk,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            skip_endpoints: default_skip_endpoints(),
            bypass_options: true,
            ancestor_walk: AncestorWalk::default(),
        }
    }
}

fn default_true() -> bool { true }
fn default_listen_addr() -> String { "127.0.0.1:8180".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout() -> u64 { 3000 }
fn default_skip_endpoints() -> Vec<String> {
    DEFAULT_SKIP_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}

impl PluginConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AuthzError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AuthzError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Apply `HBM_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_LISTEN_ADDR).ok(),
            std::env::var(ENV_DATABASE_URL).ok(),
        );
    }

    fn apply_overrides(&mut self, listen_addr: Option<String>, database_url: Option<String>) {
        if let Some(addr) = listen_addr.filter(|s| !s.is_empty()) {
            self.server.listen_addr = addr;
        }
        if let Some(url) = database_url.filter(|s| !s.is_empty()) {
            self.storage.database_url = Some(url);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        if self.storage.backend == StorageBackend::Postgres
            && self.storage.database_url.as_deref().unwrap_or_default().is_empty()
        {
            return Err(AuthzError::Config(
                "storage.database_url is required for the postgres backend".to_string(),
            ));
        }

        if self.storage.max_connections == 0 {
            return Err(AuthzError::Config(
                "storage.max_connections must be at least 1".to_string(),
            ));
        }

        Endpoints::new(self.authorization.skip_endpoints.as_slice())?;

        Ok(())
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server.listen_addr.parse().map_err(|e| {
            AuthzError::Config(format!(
                "invalid server.listen_addr {:?}: {}",
                self.server.listen_addr, e
            ))
        })
    }
}
