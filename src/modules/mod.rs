//! Command modules and the compile-time catalog of their entry points.
//!
//! A module file on disk names an entry point (`entry = "calc"`); the
//! loader resolves it here. There is no runtime introspection: a module
//! that is not registered in [`Catalog::builtin`] cannot be loaded.

mod avatar;
mod calc;
mod hello;
mod ping;
mod userinfo;

pub use avatar::ProfileModule;
pub use calc::{CalcError, CalculatorModule, evaluate};
pub use hello::HelloModule;
pub use ping::PingModule;
pub use userinfo::UserInfoModule;

use crate::error::ModuleError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tuffy_proto::Reply;

// ============================================================================
// Invocation context
// ============================================================================

/// The user on whose behalf a command runs.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: u64,
    pub name: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    /// When the caller joined the current session, if known.
    pub joined_at: Option<DateTime<Utc>>,
    /// Avatar hash; `None` means the default avatar.
    pub avatar: Option<String>,
    pub roles: Vec<String>,
}

impl Caller {
    pub fn guest(id: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: format!("guest{id}"),
            display_name: format!("Guest {id}"),
            created_at: now,
            joined_at: Some(now),
            avatar: None,
            roles: Vec::new(),
        }
    }
}

/// Context passed to each command invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub caller: Caller,
    /// When the gateway read the request line.
    pub received_at: Instant,
}

impl Invocation {
    pub fn new(caller: Caller) -> Self {
        Self {
            caller,
            received_at: Instant::now(),
        }
    }
}

/// Reply used when a command names a member the host does not know.
pub const MEMBER_NOT_FOUND: &str = "Could not find the specified member in this server.";

/// Resolve the member a command targets: the caller when `args` is empty
/// or names the caller, otherwise nobody.
pub fn resolve_member<'a>(ctx: &'a Invocation, args: &str) -> Option<&'a Caller> {
    let wanted = args.trim().trim_start_matches('@');
    if wanted.is_empty() || wanted.eq_ignore_ascii_case(&ctx.caller.name) {
        Some(&ctx.caller)
    } else {
        None
    }
}

/// Errors a command reports back to its caller.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgs(_) => "invalid_args",
            Self::Internal(_) => "internal_error",
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// A single invocable command.
#[async_trait]
pub trait Command: Send + Sync {
    /// Lowercase name used for lookup.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn invoke(&self, ctx: &Invocation, args: &str) -> Result<Reply, CommandError>;
}

/// A loadable unit grouping one or more commands.
#[async_trait]
pub trait CommandModule: Send + Sync {
    fn name(&self) -> &str;

    fn commands(&self) -> Vec<Arc<dyn Command>>;

    /// Runs once after construction, before the module is considered live.
    async fn setup(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Runs once when the module is unloaded or replaced.
    async fn teardown(&self) -> Result<(), ModuleError> {
        Ok(())
    }
}

// ============================================================================
// Settings and catalog
// ============================================================================

/// The `[settings]` table of a module file.
#[derive(Debug, Clone, Default)]
pub struct ModuleSettings {
    identifier: String,
    table: toml::Table,
}

impl ModuleSettings {
    pub fn new(identifier: impl Into<String>, table: toml::Table) -> Self {
        Self {
            identifier: identifier.into(),
            table,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// String setting; a present key of another type is an error.
    pub fn str(&self, key: &str) -> Result<Option<&str>, ModuleError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(ModuleError::new(format!(
                "setting '{key}' must be a string, got {}",
                other.type_str()
            ))),
        }
    }

    /// List-of-strings setting.
    pub fn str_list(&self, key: &str) -> Result<Option<Vec<String>>, ModuleError> {
        let Some(value) = self.table.get(key) else {
            return Ok(None);
        };
        let invalid = || ModuleError::new(format!("setting '{key}' must be a list of strings"));
        let items = value.as_array().ok_or_else(invalid)?;
        items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Integer setting.
    pub fn int(&self, key: &str) -> Result<Option<i64>, ModuleError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(n)) => Ok(Some(*n)),
            Some(other) => Err(ModuleError::new(format!(
                "setting '{key}' must be an integer, got {}",
                other.type_str()
            ))),
        }
    }
}

/// Constructor for a module entry point.
pub type ModuleFactory = fn(&ModuleSettings) -> Result<Box<dyn CommandModule>, ModuleError>;

/// Entry point name → constructor.
#[derive(Clone, Default)]
pub struct Catalog {
    entries: HashMap<&'static str, ModuleFactory>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every module shipped in this crate.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register("hello", HelloModule::build);
        catalog.register("ping", PingModule::build);
        catalog.register("calc", CalculatorModule::build);
        catalog.register("avatar", ProfileModule::build);
        catalog.register("userinfo", UserInfoModule::build);
        catalog
    }

    /// Register an entry point, replacing any previous one of that name.
    pub fn register(&mut self, name: &'static str, factory: ModuleFactory) {
        self.entries.insert(name, factory);
    }

    pub fn get(&self, name: &str) -> Option<ModuleFactory> {
        self.entries.get(name).copied()
    }

    /// Registered entry points, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(src: &str) -> ModuleSettings {
        ModuleSettings::new("cogs.test", toml::from_str(src).unwrap())
    }

    #[test]
    fn builtin_catalog_entries() {
        assert_eq!(
            Catalog::builtin().names(),
            vec!["avatar", "calc", "hello", "ping", "userinfo"]
        );
    }

    #[test]
    fn every_builtin_builds_with_defaults() {
        let catalog = Catalog::builtin();
        for name in catalog.names() {
            let factory = catalog.get(name).unwrap();
            let module = factory(&ModuleSettings::default()).unwrap();
            assert!(!module.commands().is_empty(), "{name} exposes no commands");
        }
    }

    #[test]
    fn typed_settings() {
        let s = settings("greeting = 'Howdy'\nformats = ['png']\nlimit = 3");
        assert_eq!(s.str("greeting").unwrap(), Some("Howdy"));
        assert_eq!(s.str_list("formats").unwrap(), Some(vec!["png".to_string()]));
        assert_eq!(s.int("limit").unwrap(), Some(3));
        assert_eq!(s.str("absent").unwrap(), None);
        assert!(s.str("limit").is_err());
        assert!(s.int("greeting").is_err());
        assert!(s.str_list("greeting").is_err());
    }
}
