//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use crate::lifecycle::{HostOptions, ModuleLayout};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name shown in logs.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Prefix that marks a line as a command. `/` is always accepted too.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            command_prefix: default_command_prefix(),
        }
    }
}

/// Gateway listener.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:7878").
    #[serde(default = "default_listen_address")]
    pub address: SocketAddr,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_listen_address(),
        }
    }
}

/// Module directory and watcher timing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModulesConfig {
    /// Directory scanned for module files.
    #[serde(default = "default_module_directory")]
    pub directory: String,
    /// Identifier namespace (`<namespace>.<stem>`).
    #[serde(default = "default_module_namespace")]
    pub namespace: String,
    /// Module file extension, without the dot.
    #[serde(default = "default_module_extension")]
    pub extension: String,
    /// Files starting with this prefix are ignored.
    #[serde(default = "default_reserved_prefix")]
    pub reserved_prefix: String,
    /// Milliseconds between watcher cycles.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-call limit for loader and sync calls in milliseconds. 0 disables.
    #[serde(default)]
    pub call_timeout_ms: u64,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            directory: default_module_directory(),
            namespace: default_module_namespace(),
            extension: default_module_extension(),
            reserved_prefix: default_reserved_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            call_timeout_ms: 0,
        }
    }
}

impl ModulesConfig {
    pub fn layout(&self) -> ModuleLayout {
        ModuleLayout {
            directory: self.directory.clone().into(),
            namespace: self.namespace.clone(),
            extension: self.extension.trim_start_matches('.').to_string(),
            reserved_prefix: self.reserved_prefix.clone(),
        }
    }

    pub fn host_options(&self) -> HostOptions {
        HostOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            call_timeout: (self.call_timeout_ms > 0)
                .then(|| Duration::from_millis(self.call_timeout_ms)),
        }
    }
}

/// Prometheus endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// HTTP port for `/metrics`. 0 disables the endpoint.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}
