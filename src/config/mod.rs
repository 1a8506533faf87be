//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and loading
//! - [`defaults`]: serde default values
//! - [`validation`]: startup checks that serde cannot express

mod defaults;
mod types;
mod validation;

pub use types::{Config, ConfigError, ListenConfig, MetricsConfig, ModulesConfig, ServerConfig};
pub use validation::{ValidationError, validate};
