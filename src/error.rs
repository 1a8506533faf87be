//! Error types for the module lifecycle.
//!
//! Every fallible lifecycle call has its own error enum. None of them is
//! fatal: the reconciler catches each one at the call site, logs it with
//! the module identifier, and turns it into a registry state update.
//! `error_code()` gives a static label for metrics.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Module errors (raised by module code itself)
// ============================================================================

/// Error raised by a command module's constructor, setup or teardown hook.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ModuleError(String);

impl ModuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// ============================================================================
// Scan errors
// ============================================================================

/// The watched directory could not be listed.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("module directory unavailable: {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Loader errors
// ============================================================================

/// A module failed to load or reload.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module source not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid module file {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown entry point '{0}'")]
    UnknownEntry(String),

    #[error("identifier '{0}' is outside the module namespace")]
    ForeignIdentifier(String),

    #[error("module setup failed: {0}")]
    Setup(#[from] ModuleError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl LoadError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "missing",
            Self::Io { .. } => "io",
            Self::Manifest { .. } => "manifest",
            Self::UnknownEntry(_) => "unknown_entry",
            Self::ForeignIdentifier(_) => "foreign_identifier",
            Self::Setup(_) => "setup",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// A module failed to tear down cleanly.
#[derive(Debug, Error)]
pub enum UnloadError {
    #[error("teardown failed: {0}")]
    Teardown(#[from] ModuleError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl UnloadError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Teardown(_) => "teardown",
            Self::Timeout(_) => "timeout",
        }
    }
}

// ============================================================================
// Synchronizer errors
// ============================================================================

/// Publishing the command surface failed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("publish failed: {0}")]
    Publish(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl SyncError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Publish(_) => "publish",
            Self::Timeout(_) => "timeout",
        }
    }
}

// ============================================================================
// Host errors
// ============================================================================

/// Errors returned by `ModuleHost::startup` before any module is touched.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("poll interval must be greater than zero")]
    InvalidInterval,
}
