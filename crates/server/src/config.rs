//! Server configuration loaded from a TOML file.
//!
//! Every field carries a default so a missing file or a partial file both
//! yield a runnable in-memory server.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ServerError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StowageConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Grace period for in-flight requests on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Metadata backend: "memory" or "postgres".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Connection URL, required for the postgres backend.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory that holds the stored blobs. Created on startup.
    #[serde(default = "default_storage_root")]
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_reservation_ttl")]
    pub reservation_ttl_seconds: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_table_prefix() -> String {
    "stowage_".to_string()
}

fn default_storage_root() -> String {
    "./data/blobs".to_string()
}

fn default_max_file_size() -> u64 {
    64 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_reservation_ttl() -> u64 {
    15 * 60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            pool_size: default_pool_size(),
            schema: default_schema(),
            table_prefix: default_table_prefix(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            sweep_interval_seconds: default_sweep_interval(),
            reservation_ttl_seconds: default_reservation_ttl(),
        }
    }
}

impl StowageConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&contents)
            .map_err(|e| ServerError::Config(format!("failed to parse {}: {e}", path.display())))
    }
}
