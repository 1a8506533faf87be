//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.command_prefix is required")]
    MissingCommandPrefix,
    #[error("server.command_prefix must not contain whitespace, got '{0}'")]
    InvalidCommandPrefix(String),
    #[error("modules.directory is required")]
    MissingModuleDirectory,
    #[error("modules.namespace must be a non-empty name without dots, got '{0}'")]
    InvalidNamespace(String),
    #[error("modules.extension is required")]
    MissingExtension,
    #[error("modules.poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let prefix = &config.server.command_prefix;
    if prefix.is_empty() {
        errors.push(ValidationError::MissingCommandPrefix);
    } else if prefix.chars().any(char::is_whitespace) {
        errors.push(ValidationError::InvalidCommandPrefix(prefix.clone()));
    }

    let modules = &config.modules;
    if modules.directory.trim().is_empty() {
        errors.push(ValidationError::MissingModuleDirectory);
    }
    if modules.namespace.is_empty() || modules.namespace.contains('.') {
        errors.push(ValidationError::InvalidNamespace(modules.namespace.clone()));
    }
    if modules.extension.trim_start_matches('.').is_empty() {
        errors.push(ValidationError::MissingExtension);
    }
    if modules.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
