//! Default value functions for configuration.

use std::net::SocketAddr;

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_server_name() -> String {
    "tuffy".to_string()
}

pub fn default_command_prefix() -> String {
    "!".to_string()
}

// =============================================================================
// Listen Defaults
// =============================================================================

pub fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7878))
}

// =============================================================================
// Module Defaults
// =============================================================================

pub fn default_module_directory() -> String {
    "cogs".to_string()
}

pub fn default_module_namespace() -> String {
    "cogs".to_string()
}

pub fn default_module_extension() -> String {
    "toml".to_string()
}

pub fn default_reserved_prefix() -> String {
    "__".to_string()
}

pub fn default_poll_interval_ms() -> u64 {
    1000
}

// =============================================================================
// Metrics Defaults
// =============================================================================

pub fn default_metrics_port() -> u16 {
    9090
}
